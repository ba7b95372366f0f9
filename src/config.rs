use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};
use crate::network::{Directory, Graph};
use crate::NodeId;

/// On disk a topology is an array of tagged sections, one mapping node ids
/// to transport addresses and one listing each node's neighbors:
///
/// ```json
/// [
///   { "type": "names", "config": { "A": "a@sim.local", "B": "b@sim.local" } },
///   { "type": "topo",  "config": { "A": ["B"], "B": [["A", 1]] } }
/// ]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
enum ConfigSection {
    Names(BTreeMap<NodeId, String>),
    Topo(BTreeMap<NodeId, Vec<NeighborSpec>>),
}

/// A neighbor is either a bare id (cost 1) or an `[id, cost]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeighborSpec {
    Plain(NodeId),
    Weighted(NodeId, i64),
}

impl NeighborSpec {
    pub fn id(&self) -> &NodeId {
        match self {
            NeighborSpec::Plain(id) => id,
            NeighborSpec::Weighted(id, _) => id,
        }
    }

    pub fn cost(&self) -> i64 {
        match self {
            NeighborSpec::Plain(_) => 1,
            NeighborSpec::Weighted(_, cost) => *cost,
        }
    }
}

/// Validated topology: the node set with addresses, and who neighbors whom
/// at what cost.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    names: BTreeMap<NodeId, String>,
    topology: BTreeMap<NodeId, Vec<NeighborSpec>>,
}

impl TopologyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let sections: Vec<ConfigSection> = serde_json::from_str(content)?;

        let mut names = None;
        let mut topology = None;
        for section in sections {
            match section {
                ConfigSection::Names(map) => {
                    if names.replace(map).is_some() {
                        return Err(RoutingError::Config("duplicate names section".into()));
                    }
                }
                ConfigSection::Topo(map) => {
                    if topology.replace(map).is_some() {
                        return Err(RoutingError::Config("duplicate topo section".into()));
                    }
                }
            }
        }

        let config = Self {
            names: names.ok_or_else(|| RoutingError::Config("missing names section".into()))?,
            topology: topology.ok_or_else(|| RoutingError::Config("missing topo section".into()))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let sections = vec![
            ConfigSection::Names(self.names.clone()),
            ConfigSection::Topo(self.topology.clone()),
        ];
        let content = serde_json::to_string_pretty(&sections)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Every node must be named, every neighbor known, costs non-negative,
    /// and both endpoints of a link must agree on its cost.
    fn validate(&self) -> Result<()> {
        for (node, neighbors) in &self.topology {
            if !self.names.contains_key(node) {
                return Err(RoutingError::UnknownNode(node.clone()));
            }
            for spec in neighbors {
                let neighbor = spec.id();
                if !self.names.contains_key(neighbor) {
                    return Err(RoutingError::UnknownNode(neighbor.clone()));
                }
                if neighbor == node {
                    return Err(RoutingError::Config(format!("node {node} lists itself as a neighbor")));
                }
                if spec.cost() < 0 {
                    return Err(RoutingError::InvalidWeight {
                        a: node.clone(),
                        b: neighbor.clone(),
                        weight: spec.cost(),
                    });
                }
                if neighbors.iter().filter(|other| other.id() == neighbor).count() > 1 {
                    return Err(RoutingError::Config(format!(
                        "node {node} lists neighbor {neighbor} more than once"
                    )));
                }
                let mirrored = self
                    .topology
                    .get(neighbor)
                    .map(|list| list.iter().any(|other| other.id() == node && other.cost() == spec.cost()))
                    .unwrap_or(false);
                if !mirrored {
                    return Err(RoutingError::AsymmetricLink {
                        a: node.clone(),
                        b: neighbor.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.names.keys()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn address_of(&self, node: &str) -> Result<&str> {
        self.names
            .get(node)
            .map(String::as_str)
            .ok_or_else(|| RoutingError::UnknownNode(node.to_string()))
    }

    /// Neighbor ids and link costs for one node. Nodes named but absent
    /// from the topo section are isolated and have none.
    pub fn neighbors_of(&self, node: &str) -> Result<Vec<(NodeId, u64)>> {
        if !self.names.contains_key(node) {
            return Err(RoutingError::UnknownNode(node.to_string()));
        }
        Ok(self
            .topology
            .get(node)
            .map(|list| {
                list.iter()
                    .map(|spec| (spec.id().clone(), spec.cost() as u64))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn neighbor_ids(&self, node: &str) -> Result<Vec<NodeId>> {
        Ok(self
            .neighbors_of(node)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    pub fn directory(&self) -> Directory {
        let mut directory = Directory::new();
        for (node, address) in &self.names {
            directory.insert(node.clone(), address.clone());
        }
        directory
    }

    /// The whole topology as a graph for the centralized algorithms.
    pub fn build_graph(&self) -> Result<Graph> {
        let mut graph = Graph::new();
        for node in self.names.keys() {
            graph.add_node(node.clone());
        }
        for (node, neighbors) in &self.topology {
            for spec in neighbors {
                // Links are symmetric; insert each one once
                if node.as_str() < spec.id().as_str() {
                    graph.add_edge(node, spec.id(), spec.cost())?;
                }
            }
        }
        Ok(graph)
    }
}
