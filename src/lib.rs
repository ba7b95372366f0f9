pub mod algorithms;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod router;

pub type NodeId = String;

/// Distance assigned to destinations no path is known for.
pub const INFINITY: u64 = u64::MAX;

pub use config::TopologyConfig;
pub use error::{Result, RoutingError, TransportError};
pub use network::Graph;
pub use protocol::agent::{Delivery, Disposition, DropReason, ForwardingAgent, RoutingMode};
pub use protocol::table::{RoutingEntry, RoutingTable};
pub use router::{Cluster, Router};
