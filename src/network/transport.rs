use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Result, RoutingError, TransportError};
use crate::protocol::envelope::Envelope;
use crate::NodeId;

/// Maps node ids to transport addresses and back.
///
/// Built once at setup time from the topology configuration and handed to
/// every node; nodes never reach into each other through it, they only
/// resolve addresses.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    by_node: BTreeMap<NodeId, String>,
    by_address: BTreeMap<String, NodeId>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: impl Into<NodeId>, address: impl Into<String>) {
        let node = node.into();
        let address = address.into();
        self.by_address.insert(address.clone(), node.clone());
        self.by_node.insert(node, address);
    }

    pub fn resolve(&self, node: &str) -> Result<&str> {
        self.by_node
            .get(node)
            .map(String::as_str)
            .ok_or_else(|| RoutingError::UnknownNode(node.to_string()))
    }

    pub fn node_at(&self, address: &str) -> Option<&NodeId> {
        self.by_address.get(address)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.by_node.keys()
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

/// One unit on the wire: an envelope plus the address it came from.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub sender: String,
    pub envelope: Envelope,
}

/// Delivery of envelopes to peer mailboxes.
///
/// Sending is fire-and-forget; an error means the fabric could not accept
/// the envelope, not that the peer failed to process it.
pub trait Transport: Send + Sync {
    fn send_to(&self, address: &str, envelope: Envelope) -> std::result::Result<(), TransportError>;
}

/// In-memory fabric connecting every node's mailbox through unbounded
/// channels. Cheap to clone per node; the peer map is fixed at setup.
#[derive(Clone)]
pub struct ChannelTransport {
    local: String,
    peers: Arc<HashMap<String, mpsc::UnboundedSender<Datagram>>>,
}

impl ChannelTransport {
    pub fn new(local: impl Into<String>, peers: Arc<HashMap<String, mpsc::UnboundedSender<Datagram>>>) -> Self {
        Self {
            local: local.into(),
            peers,
        }
    }
}

impl Transport for ChannelTransport {
    fn send_to(&self, address: &str, envelope: Envelope) -> std::result::Result<(), TransportError> {
        let tx = self
            .peers
            .get(address)
            .ok_or_else(|| TransportError::new(address, "no mailbox registered"))?;
        tx.send(Datagram {
            sender: self.local.clone(),
            envelope,
        })
        .map_err(|_| TransportError::new(address, "mailbox closed"))
    }
}
