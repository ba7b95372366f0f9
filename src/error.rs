//! Error types shared across the simulator.

use thiserror::Error;

use crate::NodeId;

/// Errors surfaced by graph construction, route computation and forwarding.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// A node id that is not part of the topology
    #[error("unknown node `{0}`")]
    UnknownNode(NodeId),

    /// Link weights must be non-negative
    #[error("invalid weight {weight} on link {a}-{b}")]
    InvalidWeight { a: NodeId, b: NodeId, weight: i64 },

    /// Both endpoints of a link must list each other with the same cost
    #[error("asymmetric link {a}-{b}")]
    AsymmetricLink { a: NodeId, b: NodeId },

    /// No forwarding entry for the destination
    #[error("no route to `{0}`")]
    RouteNotFound(NodeId),

    /// A flooded message ran out of hop budget
    #[error("ttl expired before reaching `{0}`")]
    TtlExpired(NodeId),

    /// Relaxation kept improving distances past the round bound
    #[error("negative cycle detected")]
    NegativeCycleDetected,

    /// The node's task is not running or its mailbox is closed
    #[error("node `{0}` is unavailable")]
    NodeUnavailable(NodeId),

    /// Malformed or inconsistent topology configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Handing an envelope to the transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O errors while reading or writing configuration files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration files that are not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to hand an envelope to a peer's mailbox.
#[derive(Error, Debug)]
#[error("delivery to `{address}` failed: {reason}")]
pub struct TransportError {
    pub address: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RoutingError>;
