use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::NodeId;

/// Everything nodes exchange, tagged on the wire by a `type` field.
///
/// The set is closed: an unknown type fails to parse instead of being
/// routed around half-understood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    Data(DataEnvelope),
    RoutingAdvertisement(AdvertisementEnvelope),
    Probe(ProbeEnvelope),
}

impl Envelope {
    pub fn origin(&self) -> &NodeId {
        match self {
            Envelope::Data(data) => &data.from,
            Envelope::RoutingAdvertisement(adv) => &adv.from,
            Envelope::Probe(probe) => &probe.from,
        }
    }

    pub fn destination(&self) -> &NodeId {
        match self {
            Envelope::Data(data) => &data.to,
            Envelope::RoutingAdvertisement(adv) => &adv.to,
            Envelope::Probe(probe) => &probe.to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Data(_) => "data",
            Envelope::RoutingAdvertisement(_) => "routing-advertisement",
            Envelope::Probe(_) => "probe",
        }
    }
}

/// Application payload in transit.
///
/// `hop_count` grows by one at every forward; `ttl` is only present on
/// flooded copies and shrinks by one at every relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub hop_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub payload: Value,
}

impl DataEnvelope {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, payload: Value) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            hop_count: 0,
            ttl: None,
            payload,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A node's cost snapshot on its way to a neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementEnvelope {
    pub from: NodeId,
    pub to: NodeId,
    pub table: BTreeMap<NodeId, u64>,
}

/// Round-trip measurement between direct neighbors. Probes are answered in
/// place, never forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEnvelope {
    pub from: NodeId,
    pub to: NodeId,
    pub id: Uuid,
    pub sent_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echoed_at: Option<i64>,
}

impl ProbeEnvelope {
    pub fn outbound(from: impl Into<NodeId>, to: impl Into<NodeId>, now_ms: i64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            id: Uuid::new_v4(),
            sent_at: now_ms,
            echoed_at: None,
        }
    }

    /// The reply: endpoints swapped, echo timestamp stamped, same id.
    pub fn echo(&self, now_ms: i64) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            id: self.id,
            sent_at: self.sent_at,
            echoed_at: Some(now_ms),
        }
    }
}
