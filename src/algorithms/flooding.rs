use crate::NodeId;

/// What a node does with a flooded message it just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodDecision {
    /// The hop budget is spent; the message dies here, even at its destination
    Expire,
    /// This node is the destination and the budget allowed the hop
    Deliver,
    /// Relay to neighbors with the decremented budget
    Relay { ttl: u32 },
}

/// Flooding rule, applied the same way at every hop.
///
/// The ttl gate comes first: a message that arrives at its destination with
/// an exhausted budget is dropped, not delivered.
pub fn decide(ttl: u32, at_destination: bool) -> FloodDecision {
    if ttl == 0 {
        FloodDecision::Expire
    } else if at_destination {
        FloodDecision::Deliver
    } else {
        FloodDecision::Relay { ttl: ttl - 1 }
    }
}

/// Relay targets: every neighbor except the one the message arrived from.
///
/// A message this node originates has no provenance and goes to all
/// neighbors. This is the only duplicate suppression flooding does; copies
/// arriving over different links are relayed again and cycles are cut by
/// the ttl alone.
pub fn targets<'a>(
    neighbors: &'a [NodeId],
    arrived_from: Option<&'a NodeId>,
) -> impl Iterator<Item = &'a NodeId> {
    neighbors
        .iter()
        .filter(move |neighbor| arrived_from != Some(*neighbor))
}
