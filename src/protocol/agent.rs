use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::algorithms::distance_vector::DistanceVectorEngine;
use crate::algorithms::flooding::{self, FloodDecision};
use crate::error::{Result, RoutingError};
use crate::network::transport::{Directory, Transport};
use crate::protocol::envelope::{AdvertisementEnvelope, DataEnvelope, Envelope, ProbeEnvelope};
use crate::protocol::table::{RoutingEntry, RoutingTable};
use crate::NodeId;

/// Hop budget put on floods originated through `send_data`.
pub const DEFAULT_FLOOD_TTL: u32 = 8;

/// How a node decides where messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Forward along a table installed from a centralized computation
    Static,
    /// Forward along a table the node converges on by itself
    DistanceVector,
    /// No table at all, relay every message within its ttl budget
    Flood,
}

/// What the agent did with one envelope or send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Handed to the local consumer
    Delivered,
    /// Sent on to a single next hop
    Forwarded { next_hop: NodeId },
    /// Relayed to this many neighbors
    Flooded { copies: usize },
    /// A routing advertisement was merged
    Applied { changed: bool },
    /// A neighbor's probe was answered
    Echoed,
    /// Our own probe came back
    Measured { rtt_ms: u64 },
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No forwarding entry for the destination
    NoRoute,
    /// The hop budget ran out
    TtlExpired,
    /// Not meaningful in this node's mode, or not addressed here
    Ignored,
}

/// A message that reached its destination, as seen by the local consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub from: NodeId,
    pub payload: Value,
    pub hops: u32,
}

struct PendingProbe {
    neighbor: NodeId,
    sent_at: i64,
}

enum Routes {
    Static(RoutingTable),
    Dynamic(DistanceVectorEngine),
    Flood,
}

/// Per-node forwarding logic.
///
/// The agent owns all mutable state of its node. It never touches another
/// node's tables; everything it learns arrives as envelopes through its
/// mailbox, and everything it emits goes out through the transport.
pub struct ForwardingAgent {
    id: NodeId,
    neighbors: Vec<NodeId>,
    routes: Routes,
    flood_ttl: u32,
    transport: Arc<dyn Transport>,
    directory: Directory,
    deliveries: mpsc::UnboundedSender<Delivery>,
    pending_probes: HashMap<Uuid, PendingProbe>,
}

impl ForwardingAgent {
    pub fn new(
        id: impl Into<NodeId>,
        neighbors: Vec<NodeId>,
        mode: RoutingMode,
        transport: Arc<dyn Transport>,
        directory: Directory,
        deliveries: mpsc::UnboundedSender<Delivery>,
    ) -> Self {
        let id = id.into();
        let routes = match mode {
            RoutingMode::Static => Routes::Static(RoutingTable::new(id.clone())),
            RoutingMode::DistanceVector => Routes::Dynamic(DistanceVectorEngine::new(id.clone())),
            RoutingMode::Flood => Routes::Flood,
        };
        Self {
            id,
            neighbors,
            routes,
            flood_ttl: DEFAULT_FLOOD_TTL,
            transport,
            directory,
            deliveries,
            pending_probes: HashMap::new(),
        }
    }

    pub fn with_flood_ttl(mut self, ttl: u32) -> Self {
        self.flood_ttl = ttl;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn mode(&self) -> RoutingMode {
        match self.routes {
            Routes::Static(_) => RoutingMode::Static,
            Routes::Dynamic(_) => RoutingMode::DistanceVector,
            Routes::Flood => RoutingMode::Flood,
        }
    }

    /// Current forwarding table, if this mode keeps one.
    pub fn table(&self) -> Option<&RoutingTable> {
        match &self.routes {
            Routes::Static(table) => Some(table),
            Routes::Dynamic(engine) => Some(engine.table()),
            Routes::Flood => None,
        }
    }

    /// One inbound envelope. `sender` is the directly attached neighbor the
    /// envelope arrived from, when the transport knows it.
    pub fn handle_envelope(&mut self, envelope: Envelope, sender: Option<&NodeId>) -> Result<Disposition> {
        match envelope {
            Envelope::Data(data) => self.handle_data(data, sender),
            Envelope::RoutingAdvertisement(adv) => self.handle_advertisement(adv),
            Envelope::Probe(probe) => self.handle_probe(probe),
        }
    }

    fn handle_data(&mut self, data: DataEnvelope, sender: Option<&NodeId>) -> Result<Disposition> {
        if matches!(self.routes, Routes::Flood) {
            return self.flood_rule(data, sender);
        }
        if data.to == self.id {
            self.deliver(data);
            return Ok(Disposition::Delivered);
        }
        if data.ttl == Some(0) {
            debug!("{}: message for {} ran out of hops", self.id, data.to);
            return Ok(Disposition::Dropped(DropReason::TtlExpired));
        }
        match self.route_to(&data.to) {
            Some(entry) => self.forward_data(data, &entry.next_hop),
            None => {
                warn!(
                    "{}: no route to {}, dropping message from {}",
                    self.id, data.to, data.from
                );
                Ok(Disposition::Dropped(DropReason::NoRoute))
            }
        }
    }

    /// Flooding applies its ttl gate before the destination check, so a
    /// message that arrives at its target with a spent budget still dies.
    fn flood_rule(&mut self, data: DataEnvelope, arrived_from: Option<&NodeId>) -> Result<Disposition> {
        match flooding::decide(data.ttl.unwrap_or(0), data.to == self.id) {
            FloodDecision::Expire => {
                debug!("{}: flood for {} expired here", self.id, data.to);
                Ok(Disposition::Dropped(DropReason::TtlExpired))
            }
            FloodDecision::Deliver => {
                self.deliver(data);
                Ok(Disposition::Delivered)
            }
            FloodDecision::Relay { ttl } => {
                let copy = DataEnvelope {
                    hop_count: data.hop_count + 1,
                    ttl: Some(ttl),
                    ..data
                };
                let copies = self.fan_out(&copy, arrived_from);
                debug!("{}: relayed flood for {} to {} neighbors", self.id, copy.to, copies);
                Ok(Disposition::Flooded { copies })
            }
        }
    }

    fn handle_advertisement(&mut self, adv: AdvertisementEnvelope) -> Result<Disposition> {
        let changed = match &mut self.routes {
            Routes::Dynamic(engine) => engine.receive_advertisement(&adv.from, &adv.table),
            _ => {
                debug!(
                    "{}: ignoring advertisement from {}, not running distance-vector",
                    self.id, adv.from
                );
                return Ok(Disposition::Dropped(DropReason::Ignored));
            }
        };
        if changed {
            info!("{}: routes updated from {}'s advertisement", self.id, adv.from);
            self.advertise();
        }
        Ok(Disposition::Applied { changed })
    }

    fn handle_probe(&mut self, probe: ProbeEnvelope) -> Result<Disposition> {
        if probe.to != self.id {
            debug!("{}: probe addressed to {} is not ours", self.id, probe.to);
            return Ok(Disposition::Dropped(DropReason::Ignored));
        }
        if probe.echoed_at.is_none() {
            let reply = probe.echo(now_ms());
            let asker = reply.to.clone();
            self.send_to_node(&asker, Envelope::Probe(reply))?;
            return Ok(Disposition::Echoed);
        }
        let Some(pending) = self.pending_probes.remove(&probe.id) else {
            debug!("{}: unsolicited probe reply {}", self.id, probe.id);
            return Ok(Disposition::Dropped(DropReason::Ignored));
        };
        let rtt_ms = (now_ms() - pending.sent_at).max(1) as u64;
        info!("{}: link to {} measured at {}ms", self.id, pending.neighbor, rtt_ms);
        let changed = match &mut self.routes {
            Routes::Dynamic(engine) => engine.load_direct(&pending.neighbor, rtt_ms),
            _ => false,
        };
        if changed {
            self.advertise();
        }
        Ok(Disposition::Measured { rtt_ms })
    }

    /// Originates a message. Table modes pick the next hop; flood mode fans
    /// out with the default budget.
    pub fn send_data(&mut self, to: &str, payload: Value) -> Result<Disposition> {
        if to == self.id {
            self.deliver(DataEnvelope::new(self.id.clone(), self.id.clone(), payload));
            return Ok(Disposition::Delivered);
        }
        if matches!(self.routes, Routes::Flood) {
            return self.send_flood(to, payload, self.flood_ttl);
        }
        match self.route_to(to) {
            Some(entry) => {
                let data = DataEnvelope::new(self.id.clone(), to, payload);
                info!("{}: sending message for {} via {}", self.id, to, entry.next_hop);
                self.send_to_node(&entry.next_hop, Envelope::Data(data))?;
                Ok(Disposition::Forwarded {
                    next_hop: entry.next_hop,
                })
            }
            None => Err(RoutingError::RouteNotFound(to.to_string())),
        }
    }

    /// Originates a flood. The budget is spent by relays, not by this first
    /// fan-out, so `ttl` is the number of links the message may cross.
    pub fn send_flood(&mut self, to: &str, payload: Value, ttl: u32) -> Result<Disposition> {
        if to == self.id {
            self.deliver(DataEnvelope::new(self.id.clone(), self.id.clone(), payload).with_ttl(ttl));
            return Ok(Disposition::Delivered);
        }
        if ttl == 0 {
            debug!("{}: flood for {} started with no budget", self.id, to);
            return Ok(Disposition::Dropped(DropReason::TtlExpired));
        }
        let data = DataEnvelope::new(self.id.clone(), to, payload).with_ttl(ttl);
        let copies = self.fan_out(&data, None);
        info!("{}: flooded message for {} to {} neighbors", self.id, data.to, copies);
        Ok(Disposition::Flooded { copies })
    }

    /// Sends our cost snapshot to every neighbor. Best effort; failures are
    /// logged and skipped. Returns how many neighbors got it.
    pub fn advertise(&self) -> usize {
        let Routes::Dynamic(engine) = &self.routes else {
            debug!("{}: not running distance-vector, nothing to advertise", self.id);
            return 0;
        };
        let table = engine.advertisement();
        let mut sent = 0;
        for neighbor in flooding::targets(&self.neighbors, None) {
            let envelope = Envelope::RoutingAdvertisement(AdvertisementEnvelope {
                from: self.id.clone(),
                to: neighbor.clone(),
                table: table.clone(),
            });
            match self.send_to_node(neighbor, envelope) {
                Ok(()) => sent += 1,
                Err(e) => warn!("{}: advertisement to {} failed: {}", self.id, neighbor, e),
            }
        }
        debug!("{}: advertised {} destinations to {} neighbors", self.id, table.len(), sent);
        sent
    }

    /// Measures every direct link with a probe round trip.
    pub fn probe_neighbors(&mut self) -> usize {
        let now = now_ms();
        let neighbors = self.neighbors.clone();
        let mut sent = 0;
        for neighbor in &neighbors {
            let probe = ProbeEnvelope::outbound(self.id.clone(), neighbor.clone(), now);
            let id = probe.id;
            match self.send_to_node(neighbor, Envelope::Probe(probe)) {
                Ok(()) => {
                    self.pending_probes.insert(
                        id,
                        PendingProbe {
                            neighbor: neighbor.clone(),
                            sent_at: now,
                        },
                    );
                    sent += 1;
                }
                Err(e) => warn!("{}: probe to {} failed: {}", self.id, neighbor, e),
            }
        }
        sent
    }

    /// Sets a direct link cost without announcing it. Used at startup.
    pub fn seed_link(&mut self, neighbor: &str, cost: u64) -> bool {
        match &mut self.routes {
            Routes::Dynamic(engine) => engine.load_direct(neighbor, cost),
            _ => {
                debug!("{}: link costs only apply in distance-vector mode", self.id);
                false
            }
        }
    }

    /// Changes a direct link cost and tells the neighborhood when the table
    /// moved.
    pub fn update_link(&mut self, neighbor: &str, cost: u64) -> bool {
        let changed = self.seed_link(neighbor, cost);
        if changed {
            info!("{}: link to {} now costs {}", self.id, neighbor, cost);
            self.advertise();
        }
        changed
    }

    /// Tears down a direct link and announces the fallout.
    pub fn drop_link(&mut self, neighbor: &str) -> bool {
        let changed = match &mut self.routes {
            Routes::Dynamic(engine) => engine.remove_direct(neighbor),
            _ => false,
        };
        if changed {
            info!("{}: link to {} is down", self.id, neighbor);
            self.advertise();
        }
        changed
    }

    /// Replaces the forwarding table with one computed elsewhere and pins
    /// the agent to static mode.
    pub fn install_table(&mut self, table: RoutingTable) -> Result<()> {
        if table.local() != &self.id {
            return Err(RoutingError::Config(format!(
                "table belongs to {}, agent is {}",
                table.local(),
                self.id
            )));
        }
        info!("{}: installed table with {} entries", self.id, table.len());
        self.routes = Routes::Static(table);
        Ok(())
    }

    fn route_to(&self, destination: &str) -> Option<RoutingEntry> {
        match &self.routes {
            Routes::Static(table) => table.get(destination).cloned(),
            Routes::Dynamic(engine) => engine.table().get(destination).cloned(),
            Routes::Flood => None,
        }
    }

    fn forward_data(&self, data: DataEnvelope, next_hop: &NodeId) -> Result<Disposition> {
        let forwarded = DataEnvelope {
            hop_count: data.hop_count + 1,
            ttl: data.ttl.map(|t| t.saturating_sub(1)),
            ..data
        };
        debug!(
            "{}: forwarding message from {} for {} via {}",
            self.id, forwarded.from, forwarded.to, next_hop
        );
        self.send_to_node(next_hop, Envelope::Data(forwarded))?;
        Ok(Disposition::Forwarded {
            next_hop: next_hop.clone(),
        })
    }

    fn fan_out(&self, data: &DataEnvelope, exclude: Option<&NodeId>) -> usize {
        let mut copies = 0;
        for neighbor in flooding::targets(&self.neighbors, exclude) {
            match self.send_to_node(neighbor, Envelope::Data(data.clone())) {
                Ok(()) => copies += 1,
                Err(e) => warn!("{}: flood copy to {} failed: {}", self.id, neighbor, e),
            }
        }
        copies
    }

    fn deliver(&self, data: DataEnvelope) {
        info!(
            "{}: message from {} delivered after {} hops",
            self.id, data.from, data.hop_count
        );
        let delivery = Delivery {
            from: data.from,
            payload: data.payload,
            hops: data.hop_count,
        };
        if self.deliveries.send(delivery).is_err() {
            warn!("{}: local consumer is gone, delivery discarded", self.id);
        }
    }

    fn send_to_node(&self, node: &str, envelope: Envelope) -> Result<()> {
        let address = self.directory.resolve(node)?;
        self.transport.send_to(address, envelope)?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
