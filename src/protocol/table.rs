use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithms::dijkstra::ShortestPath;
use crate::NodeId;

/// One forwarding decision: how far the destination is and which neighbor
/// to hand the message to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub distance: u64,
    pub next_hop: NodeId,
}

/// Per-node forwarding state.
///
/// Only finite routes are stored; a destination with no entry is
/// unreachable. The owner's own entry (distance 0, next hop itself) is
/// always present. Each node mutates its own table and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    local: NodeId,
    entries: BTreeMap<NodeId, RoutingEntry>,
}

impl RoutingTable {
    pub fn new(local: impl Into<NodeId>) -> Self {
        let local = local.into();
        let mut entries = BTreeMap::new();
        entries.insert(
            local.clone(),
            RoutingEntry {
                distance: 0,
                next_hop: local.clone(),
            },
        );
        Self { local, entries }
    }

    /// Builds a table from a centralized shortest-path run, keeping only
    /// reachable destinations.
    pub fn from_shortest_paths(local: impl Into<NodeId>, routes: &BTreeMap<NodeId, ShortestPath>) -> Self {
        let mut table = Self::new(local);
        for (dest, route) in routes {
            if *dest == table.local {
                continue;
            }
            let Some(next_hop) = route.next_hop() else {
                continue;
            };
            table.entries.insert(
                dest.clone(),
                RoutingEntry {
                    distance: route.distance,
                    next_hop: next_hop.clone(),
                },
            );
        }
        table
    }

    pub fn local(&self) -> &NodeId {
        &self.local
    }

    pub fn get(&self, destination: &str) -> Option<&RoutingEntry> {
        self.entries.get(destination)
    }

    pub fn distance_to(&self, destination: &str) -> Option<u64> {
        self.entries.get(destination).map(|entry| entry.distance)
    }

    pub fn next_hop(&self, destination: &str) -> Option<&NodeId> {
        self.entries.get(destination).map(|entry| &entry.next_hop)
    }

    pub fn insert(&mut self, destination: impl Into<NodeId>, entry: RoutingEntry) {
        self.entries.insert(destination.into(), entry);
    }

    /// Removes a destination. The owner's own entry stays.
    pub fn remove(&mut self, destination: &str) -> Option<RoutingEntry> {
        if destination == self.local {
            return None;
        }
        self.entries.remove(destination)
    }

    /// Drops every route that leads through the given neighbor, including
    /// the direct entry for the neighbor itself.
    pub fn purge_via(&mut self, neighbor: &str) -> usize {
        let local = self.local.clone();
        let before = self.entries.len();
        self.entries
            .retain(|dest, entry| *dest == local || (dest != neighbor && entry.next_hop != neighbor));
        before - self.entries.len()
    }

    /// Distance view of the table, as advertised to neighbors.
    pub fn snapshot(&self) -> BTreeMap<NodeId, u64> {
        self.entries
            .iter()
            .map(|(dest, entry)| (dest.clone(), entry.distance))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &RoutingEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routing table of {}:", self.local)?;
        writeln!(f, "{:<15} {:<15} {:<10}", "Destination", "Next Hop", "Cost")?;
        writeln!(f, "{}", "-".repeat(42))?;
        for (dest, entry) in &self.entries {
            writeln!(f, "{:<15} {:<15} {:<10}", dest, entry.next_hop, entry.distance)?;
        }
        Ok(())
    }
}
