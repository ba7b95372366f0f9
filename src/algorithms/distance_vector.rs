use std::collections::BTreeMap;

use log::debug;

use crate::algorithms::dijkstra::{collect_routes, ShortestPath};
use crate::error::{Result, RoutingError};
use crate::network::Graph;
use crate::protocol::table::{RoutingEntry, RoutingTable};
use crate::{NodeId, INFINITY};

/// Costs at or above this are treated as unreachable, which bounds the
/// count-to-infinity climb after a link failure.
pub const DEFAULT_MAX_METRIC: u64 = 1024;

/// Per-node distance-vector state.
///
/// The engine only ever sees its own link costs and the advertisements its
/// neighbors hand it; global topology stays unknown to it. An advertisement
/// is the advertiser's complete cost snapshot, so a destination missing
/// from it means the advertiser has no route there.
#[derive(Debug, Clone)]
pub struct DistanceVectorEngine {
    table: RoutingTable,
    max_metric: u64,
}

impl DistanceVectorEngine {
    pub fn new(local: impl Into<NodeId>) -> Self {
        Self::with_max_metric(local, DEFAULT_MAX_METRIC)
    }

    pub fn with_max_metric(local: impl Into<NodeId>, max_metric: u64) -> Self {
        Self {
            table: RoutingTable::new(local),
            max_metric,
        }
    }

    pub fn local(&self) -> &NodeId {
        self.table.local()
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn max_metric(&self) -> u64 {
        self.max_metric
    }

    /// Sets the measured cost of a direct link. Returns whether the table
    /// changed.
    pub fn load_direct(&mut self, neighbor: &str, cost: u64) -> bool {
        if neighbor == self.table.local() {
            return false;
        }
        let entry = RoutingEntry {
            distance: cost,
            next_hop: neighbor.to_string(),
        };
        if self.table.get(neighbor) == Some(&entry) {
            return false;
        }
        self.table.insert(neighbor, entry);
        true
    }

    /// Tears down a direct link, dropping every route that ran through the
    /// neighbor. Returns whether the table changed.
    pub fn remove_direct(&mut self, neighbor: &str) -> bool {
        self.table.purge_via(neighbor) > 0
    }

    /// Merges a neighbor's advertised cost snapshot.
    ///
    /// Candidate costs are our cost to the advertiser plus their advertised
    /// cost. A cheaper candidate wins the entry; for destinations we already
    /// route through the advertiser, their claim replaces ours even when it
    /// got worse. Candidates at or past the metric bound count as
    /// unreachable. Returns whether the table changed, which is the signal
    /// to re-advertise.
    pub fn receive_advertisement(&mut self, neighbor: &str, advertised: &BTreeMap<NodeId, u64>) -> bool {
        let Some(cost_to_neighbor) = self.table.distance_to(neighbor) else {
            debug!(
                "{}: ignoring advertisement from {}, no entry to cost it with",
                self.table.local(),
                neighbor
            );
            return false;
        };

        let mut changed = false;

        // Routes through the advertiser for destinations it no longer
        // mentions are gone with it.
        let stale: Vec<NodeId> = self
            .table
            .iter()
            .filter(|(dest, entry)| entry.next_hop == neighbor && !advertised.contains_key(*dest))
            .map(|(dest, _)| dest.clone())
            .collect();
        for dest in stale {
            debug!("{}: route to {} via {} withdrawn", self.table.local(), dest, neighbor);
            self.table.remove(&dest);
            changed = true;
        }

        for (dest, &advertised_cost) in advertised {
            if dest == self.table.local() {
                continue;
            }
            let candidate = cost_to_neighbor.saturating_add(advertised_cost);
            let reachable = candidate < self.max_metric;

            match self.table.get(dest) {
                Some(current) if current.next_hop == neighbor => {
                    if !reachable {
                        debug!(
                            "{}: route to {} via {} passed the metric bound",
                            self.table.local(),
                            dest,
                            neighbor
                        );
                        self.table.remove(dest);
                        changed = true;
                    } else if candidate != current.distance {
                        self.table.insert(
                            dest.clone(),
                            RoutingEntry {
                                distance: candidate,
                                next_hop: neighbor.to_string(),
                            },
                        );
                        changed = true;
                    }
                }
                Some(current) => {
                    if reachable && candidate < current.distance {
                        self.table.insert(
                            dest.clone(),
                            RoutingEntry {
                                distance: candidate,
                                next_hop: neighbor.to_string(),
                            },
                        );
                        changed = true;
                    }
                }
                None => {
                    if reachable {
                        self.table.insert(
                            dest.clone(),
                            RoutingEntry {
                                distance: candidate,
                                next_hop: neighbor.to_string(),
                            },
                        );
                        changed = true;
                    }
                }
            }
        }

        changed
    }

    /// Cost snapshot to hand to neighbors, own entry included.
    pub fn advertisement(&self) -> BTreeMap<NodeId, u64> {
        self.table.snapshot()
    }
}

/// Centralized single-source shortest paths by repeated relaxation.
///
/// Runs at most |V|-1 relaxation rounds, then verifies stability; any
/// further improvement is reported as a negative cycle.
pub fn bellman_ford(graph: &Graph, source: &str) -> Result<BTreeMap<NodeId, ShortestPath>> {
    if !graph.contains(source) {
        return Err(RoutingError::UnknownNode(source.to_string()));
    }

    let mut distances: BTreeMap<NodeId, u64> = graph
        .node_ids()
        .map(|id| (id.clone(), INFINITY))
        .collect();
    let mut previous: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    distances.insert(source.to_string(), 0);

    for _ in 1..graph.len().max(1) {
        let mut improved = false;
        for node in graph.node_ids() {
            let base = distances[node.as_str()];
            if base == INFINITY {
                continue;
            }
            for (neighbor, weight) in graph.neighbors(node) {
                let candidate = base.saturating_add(*weight);
                if candidate < distances[neighbor.as_str()] {
                    distances.insert(neighbor.clone(), candidate);
                    previous.insert(neighbor.clone(), node.clone());
                    improved = true;
                }
            }
        }
        if !improved {
            break;
        }
    }

    for node in graph.node_ids() {
        let base = distances[node.as_str()];
        if base == INFINITY {
            continue;
        }
        for (neighbor, weight) in graph.neighbors(node) {
            if base.saturating_add(*weight) < distances[neighbor.as_str()] {
                return Err(RoutingError::NegativeCycleDetected);
            }
        }
    }

    Ok(collect_routes(&distances, &previous, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::dijkstra::{nine_node_graph, shortest_paths};

    fn advert(pairs: &[(&str, u64)]) -> BTreeMap<NodeId, u64> {
        pairs.iter().map(|(id, c)| (id.to_string(), *c)).collect()
    }

    #[test]
    fn learns_cheaper_routes_through_neighbors() {
        // Triangle with a costly direct edge: A-B=1, B-C=2, A-C=4
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);
        a.load_direct("C", 4);

        let changed = a.receive_advertisement("B", &advert(&[("B", 0), ("A", 1), ("C", 2)]));
        assert!(changed);
        assert_eq!(a.table().distance_to("C"), Some(3));
        assert_eq!(a.table().next_hop("C").map(String::as_str), Some("B"));
        // The direct link stays as the route to B itself
        assert_eq!(a.table().distance_to("B"), Some(1));
    }

    #[test]
    fn repeated_advertisements_are_idempotent() {
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);

        let advertised = advert(&[("B", 0), ("C", 2)]);
        assert!(a.receive_advertisement("B", &advertised));
        assert!(!a.receive_advertisement("B", &advertised));
        assert_eq!(a.table().distance_to("C"), Some(3));
    }

    #[test]
    fn advertisement_from_unknown_neighbor_is_ignored() {
        let mut a = DistanceVectorEngine::new("A");

        let changed = a.receive_advertisement("B", &advert(&[("B", 0), ("C", 1)]));
        assert!(!changed);
        assert_eq!(a.table().len(), 1);
    }

    #[test]
    fn own_entry_survives_any_advertisement() {
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);

        a.receive_advertisement("B", &advert(&[("B", 0), ("A", 7)]));
        assert_eq!(a.table().distance_to("A"), Some(0));
        assert_eq!(a.table().next_hop("A").map(String::as_str), Some("A"));
    }

    #[test]
    fn bad_news_from_the_current_next_hop_is_adopted() {
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);
        a.receive_advertisement("B", &advert(&[("B", 0), ("C", 1)]));
        assert_eq!(a.table().distance_to("C"), Some(2));

        let changed = a.receive_advertisement("B", &advert(&[("B", 0), ("C", 5)]));
        assert!(changed);
        assert_eq!(a.table().distance_to("C"), Some(6));
    }

    #[test]
    fn withdrawn_destinations_are_dropped() {
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);
        a.receive_advertisement("B", &advert(&[("B", 0), ("C", 1)]));
        assert_eq!(a.table().distance_to("C"), Some(2));

        let changed = a.receive_advertisement("B", &advert(&[("B", 0)]));
        assert!(changed);
        assert!(a.table().get("C").is_none());
    }

    #[test]
    fn removing_a_link_purges_routes_through_it() {
        let mut a = DistanceVectorEngine::new("A");
        a.load_direct("B", 1);
        a.load_direct("D", 2);
        a.receive_advertisement("B", &advert(&[("B", 0), ("C", 1)]));

        assert!(a.remove_direct("B"));
        assert!(a.table().get("B").is_none());
        assert!(a.table().get("C").is_none());
        assert_eq!(a.table().distance_to("D"), Some(2));
        assert!(!a.remove_direct("B"));
    }

    #[test]
    fn count_to_infinity_is_bounded_by_the_metric() {
        // Line A-B with a dead C behind B. A still believes C is at cost 2
        // through B; B re-learns C through A and the pair ferries the cost
        // upward until the bound removes the entry on both sides.
        let max = 16;
        let mut a = DistanceVectorEngine::with_max_metric("A", max);
        let mut b = DistanceVectorEngine::with_max_metric("B", max);
        a.load_direct("B", 1);
        b.load_direct("A", 1);
        b.load_direct("C", 1);
        a.receive_advertisement("B", &b.advertisement());
        assert_eq!(a.table().distance_to("C"), Some(2));

        b.remove_direct("C");

        let mut exchanges = 0;
        loop {
            let mut any = false;
            any |= b.receive_advertisement("A", &a.advertisement());
            any |= a.receive_advertisement("B", &b.advertisement());
            exchanges += 1;
            if !any {
                break;
            }
            assert!(exchanges <= max, "cost climb never terminated");
        }

        assert!(a.table().get("C").is_none());
        assert!(b.table().get("C").is_none());
    }

    #[test]
    fn bellman_ford_matches_dijkstra() {
        let graph = nine_node_graph();
        for source in ["A", "E", "I"] {
            let by_relaxation = bellman_ford(&graph, source).unwrap();
            let by_selection = shortest_paths(&graph, source).unwrap();
            for (dest, route) in &by_selection {
                assert_eq!(by_relaxation[dest].distance, route.distance, "{source} -> {dest}");
            }
        }
    }

    #[test]
    fn bellman_ford_reports_unreachable_nodes() {
        let mut graph = nine_node_graph();
        graph.add_node("Z");

        let routes = bellman_ford(&graph, "A").unwrap();
        assert_eq!(routes["Z"].distance, INFINITY);
        assert!(routes["Z"].path.is_none());
    }

    #[test]
    fn bellman_ford_rejects_unknown_sources() {
        let graph = nine_node_graph();
        assert!(matches!(
            bellman_ford(&graph, "Z"),
            Err(RoutingError::UnknownNode(id)) if id == "Z"
        ));
    }
}
