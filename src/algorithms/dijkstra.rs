use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, RoutingError};
use crate::network::Graph;
use crate::{NodeId, INFINITY};

/// Result of a shortest-path computation for one destination.
///
/// Unreachable destinations carry `INFINITY` and no path. The source's own
/// entry has distance 0 and the single-element path `[source]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPath {
    pub distance: u64,
    pub path: Option<Vec<NodeId>>,
}

impl ShortestPath {
    pub fn is_reachable(&self) -> bool {
        self.distance != INFINITY
    }

    /// First node after the source on the path, if any.
    pub fn next_hop(&self) -> Option<&NodeId> {
        self.path.as_ref().and_then(|path| path.get(1))
    }
}

/// Single-source shortest paths over the whole graph.
///
/// Every node of the graph gets an entry. Selection scans the unvisited set
/// for the smallest tentative distance; equal distances resolve to the
/// smallest node id, so results are deterministic for a given graph.
pub fn shortest_paths(graph: &Graph, source: &str) -> Result<BTreeMap<NodeId, ShortestPath>> {
    if !graph.contains(source) {
        return Err(RoutingError::UnknownNode(source.to_string()));
    }

    let mut distances: BTreeMap<NodeId, u64> = graph
        .node_ids()
        .map(|id| (id.clone(), INFINITY))
        .collect();
    let mut previous: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut unvisited: BTreeSet<NodeId> = graph.node_ids().cloned().collect();
    distances.insert(source.to_string(), 0);

    while let Some(current) = unvisited
        .iter()
        .min_by_key(|id| distances[id.as_str()])
        .cloned()
    {
        let base = distances[current.as_str()];
        if base == INFINITY {
            // Everything left is unreachable
            break;
        }
        unvisited.remove(&current);

        for (neighbor, weight) in graph.neighbors(&current) {
            if !unvisited.contains(neighbor) {
                continue;
            }
            let candidate = base.saturating_add(*weight);
            if candidate < distances[neighbor.as_str()] {
                distances.insert(neighbor.clone(), candidate);
                previous.insert(neighbor.clone(), current.clone());
            }
        }
    }

    Ok(collect_routes(&distances, &previous, source))
}

pub(crate) fn collect_routes(
    distances: &BTreeMap<NodeId, u64>,
    previous: &BTreeMap<NodeId, NodeId>,
    source: &str,
) -> BTreeMap<NodeId, ShortestPath> {
    let mut routes = BTreeMap::new();
    for (id, &distance) in distances {
        let path = (distance != INFINITY).then(|| reconstruct_path(previous, source, id));
        routes.insert(id.clone(), ShortestPath { distance, path });
    }
    routes
}

fn reconstruct_path(previous: &BTreeMap<NodeId, NodeId>, source: &str, dest: &str) -> Vec<NodeId> {
    let mut path = vec![dest.to_string()];
    let mut current = dest;
    while current != source {
        match previous.get(current) {
            Some(prev) => {
                path.push(prev.clone());
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Nine-node topology used across the test suite.
#[cfg(test)]
pub(crate) fn nine_node_graph() -> Graph {
    let mut graph = Graph::new();
    for id in ["A", "B", "C", "D", "E", "F", "G", "H", "I"] {
        graph.add_node(id);
    }
    for (a, b, w) in [
        ("A", "B", 7),
        ("A", "I", 1),
        ("A", "C", 7),
        ("I", "D", 6),
        ("C", "D", 5),
        ("D", "F", 1),
        ("F", "H", 4),
        ("F", "G", 3),
        ("G", "E", 4),
        ("D", "E", 1),
        ("F", "B", 2),
    ] {
        graph.add_edge(a, b, w).unwrap();
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_of<'a>(routes: &'a BTreeMap<NodeId, ShortestPath>, dest: &str) -> Vec<&'a str> {
        routes[dest]
            .path
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn nine_node_distances_and_paths() {
        let graph = nine_node_graph();
        let routes = shortest_paths(&graph, "A").unwrap();

        assert_eq!(routes["E"].distance, 8);
        assert_eq!(path_of(&routes, "E"), ["A", "I", "D", "E"]);
        assert_eq!(routes["F"].distance, 8);
        assert_eq!(path_of(&routes, "F"), ["A", "I", "D", "F"]);

        assert_eq!(routes["B"].distance, 7);
        assert_eq!(routes["C"].distance, 7);
        assert_eq!(routes["D"].distance, 7);
        assert_eq!(routes["G"].distance, 11);
        assert_eq!(routes["H"].distance, 12);
        assert_eq!(routes["I"].distance, 1);
    }

    #[test]
    fn source_routes_to_itself() {
        let graph = nine_node_graph();
        let routes = shortest_paths(&graph, "A").unwrap();

        assert_eq!(routes["A"].distance, 0);
        assert_eq!(path_of(&routes, "A"), ["A"]);
        assert!(routes["A"].next_hop().is_none());
    }

    #[test]
    fn unreachable_nodes_get_infinity() {
        let mut graph = nine_node_graph();
        graph.add_node("Z");

        let routes = shortest_paths(&graph, "A").unwrap();
        assert_eq!(routes["Z"].distance, INFINITY);
        assert!(routes["Z"].path.is_none());
        assert!(!routes["Z"].is_reachable());
    }

    #[test]
    fn unknown_source_is_an_error() {
        let graph = nine_node_graph();
        let err = shortest_paths(&graph, "Z").unwrap_err();
        assert!(matches!(err, RoutingError::UnknownNode(id) if id == "Z"));
    }

    #[test]
    fn equal_cost_ties_pick_the_smaller_id() {
        let mut graph = Graph::new();
        for id in ["A", "B", "C", "D"] {
            graph.add_node(id);
        }
        graph.add_edge("A", "B", 1).unwrap();
        graph.add_edge("A", "C", 1).unwrap();
        graph.add_edge("B", "D", 1).unwrap();
        graph.add_edge("C", "D", 1).unwrap();

        let routes = shortest_paths(&graph, "A").unwrap();
        assert_eq!(routes["D"].distance, 2);
        assert_eq!(path_of(&routes, "D"), ["A", "B", "D"]);
    }

    // Exhaustive walk over every simple path, as a cross-check oracle.
    fn cheapest_by_enumeration(graph: &Graph, source: &str, dest: &str) -> Option<u64> {
        fn walk(
            graph: &Graph,
            current: &str,
            dest: &str,
            cost: u64,
            seen: &mut Vec<NodeId>,
            best: &mut Option<u64>,
        ) {
            if current == dest {
                *best = Some(best.map_or(cost, |b: u64| b.min(cost)));
                return;
            }
            for (neighbor, weight) in graph.neighbors(current) {
                if seen.iter().any(|s| s == neighbor) {
                    continue;
                }
                seen.push(neighbor.clone());
                walk(graph, neighbor, dest, cost + weight, seen, best);
                seen.pop();
            }
        }

        let mut best = None;
        let mut seen = vec![source.to_string()];
        walk(graph, source, dest, 0, &mut seen, &mut best);
        best
    }

    #[test]
    fn agrees_with_exhaustive_search() {
        let graph = nine_node_graph();
        for source in ["A", "D", "H"] {
            let routes = shortest_paths(&graph, source).unwrap();
            for dest in graph.node_ids() {
                let expected = cheapest_by_enumeration(&graph, source, dest);
                assert_eq!(
                    expected,
                    routes[dest].is_reachable().then_some(routes[dest].distance),
                    "{source} -> {dest}"
                );
            }
        }
    }

    #[test]
    fn paths_walk_existing_edges() {
        let graph = nine_node_graph();
        let routes = shortest_paths(&graph, "H").unwrap();

        for (dest, route) in &routes {
            let Some(path) = &route.path else { continue };
            assert_eq!(path.first().map(String::as_str), Some("H"));
            assert_eq!(path.last(), Some(dest));
            let mut total = 0;
            for pair in path.windows(2) {
                let weight = graph
                    .neighbors(&pair[0])
                    .iter()
                    .find(|(n, _)| *n == pair[1])
                    .map(|(_, w)| *w);
                total += weight.expect("path uses a missing edge");
            }
            assert_eq!(total, route.distance);
        }
    }
}
