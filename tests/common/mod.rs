//! Shared topology fixtures for the integration suite.

use routesim::TopologyConfig;

/// Nine weighted nodes; the cheap spine out of A runs through I and D.
pub fn nine_node() -> TopologyConfig {
    TopologyConfig::from_json(
        r#"[
          { "type": "names", "config": {
            "A": "a@sim.local", "B": "b@sim.local", "C": "c@sim.local",
            "D": "d@sim.local", "E": "e@sim.local", "F": "f@sim.local",
            "G": "g@sim.local", "H": "h@sim.local", "I": "i@sim.local" } },
          { "type": "topo", "config": {
            "A": [["B", 7], ["I", 1], ["C", 7]],
            "B": [["A", 7], ["F", 2]],
            "C": [["A", 7], ["D", 5]],
            "D": [["I", 6], ["C", 5], ["F", 1], ["E", 1]],
            "E": [["G", 4], ["D", 1]],
            "F": [["D", 1], ["H", 4], ["G", 3], ["B", 2]],
            "G": [["F", 3], ["E", 4]],
            "H": [["F", 4]],
            "I": [["A", 1], ["D", 6]] } }
        ]"#,
    )
    .unwrap()
}

/// Triangle where the detour through B undercuts the direct A-C link.
pub fn triangle() -> TopologyConfig {
    TopologyConfig::from_json(
        r#"[
          { "type": "names", "config": {
            "A": "a@sim.local", "B": "b@sim.local", "C": "c@sim.local" } },
          { "type": "topo", "config": {
            "A": [["B", 1], ["C", 4]],
            "B": [["A", 1], ["C", 2]],
            "C": [["A", 4], ["B", 2]] } }
        ]"#,
    )
    .unwrap()
}

/// A plain unit-cost line, A - B - C.
pub fn line() -> TopologyConfig {
    TopologyConfig::from_json(
        r#"[
          { "type": "names", "config": {
            "A": "a@sim.local", "B": "b@sim.local", "C": "c@sim.local" } },
          { "type": "topo", "config": {
            "A": ["B"],
            "B": ["A", "C"],
            "C": ["B"] } }
        ]"#,
    )
    .unwrap()
}

/// Four unit-cost nodes in a cycle; two disjoint paths between opposite
/// corners.
pub fn square() -> TopologyConfig {
    TopologyConfig::from_json(
        r#"[
          { "type": "names", "config": {
            "A": "a@sim.local", "B": "b@sim.local",
            "C": "c@sim.local", "D": "d@sim.local" } },
          { "type": "topo", "config": {
            "A": ["B", "D"],
            "B": ["A", "C"],
            "C": ["B", "D"],
            "D": ["C", "A"] } }
        ]"#,
    )
    .unwrap()
}
