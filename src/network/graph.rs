use std::collections::BTreeMap;

use crate::error::{Result, RoutingError};
use crate::NodeId;

/// Undirected weighted topology used by the centralized algorithms.
///
/// Adjacency lists keep insertion order; the node set iterates in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: BTreeMap<NodeId, Vec<(NodeId, u64)>>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, id: impl Into<NodeId>) {
        self.adjacency.entry(id.into()).or_default();
    }

    /// Adds an undirected link between two known nodes.
    ///
    /// Both endpoints must have been added first, and the weight must be
    /// non-negative.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: i64) -> Result<()> {
        if !self.adjacency.contains_key(a) {
            return Err(RoutingError::UnknownNode(a.to_string()));
        }
        if !self.adjacency.contains_key(b) {
            return Err(RoutingError::UnknownNode(b.to_string()));
        }
        if weight < 0 {
            return Err(RoutingError::InvalidWeight {
                a: a.to_string(),
                b: b.to_string(),
                weight,
            });
        }

        let weight = weight as u64;
        if let Some(edges) = self.adjacency.get_mut(a) {
            edges.push((b.to_string(), weight));
        }
        if let Some(edges) = self.adjacency.get_mut(b) {
            edges.push((a.to_string(), weight));
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Neighbors of a node with their link weights. Unknown ids have none.
    pub fn neighbors(&self, id: &str) -> &[(NodeId, u64)] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.adjacency.keys()
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }
}
