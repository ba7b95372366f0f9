use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;

use crate::algorithms::dijkstra::shortest_paths;
use crate::config::TopologyConfig;
use crate::error::{Result, RoutingError};
use crate::network::{ChannelTransport, Datagram, Directory, Graph};
use crate::protocol::agent::{Delivery, Disposition, ForwardingAgent, RoutingMode};
use crate::protocol::table::RoutingTable;
use crate::NodeId;

enum Command {
    SendData {
        to: NodeId,
        payload: Value,
        responder: oneshot::Sender<Result<Disposition>>,
    },
    SendFlood {
        to: NodeId,
        payload: Value,
        ttl: u32,
        responder: oneshot::Sender<Result<Disposition>>,
    },
    Advertise {
        responder: oneshot::Sender<usize>,
    },
    ProbeNeighbors {
        responder: oneshot::Sender<usize>,
    },
    UpdateLink {
        neighbor: NodeId,
        cost: u64,
        responder: oneshot::Sender<bool>,
    },
    DropLink {
        neighbor: NodeId,
        responder: oneshot::Sender<bool>,
    },
    InstallTable {
        table: RoutingTable,
        responder: oneshot::Sender<Result<()>>,
    },
    Table {
        responder: oneshot::Sender<Option<RoutingTable>>,
    },
    Shutdown,
}

/// Handle to one node's task. All interaction goes through the node's
/// command mailbox, so the task stays the single writer of its state.
#[derive(Clone)]
pub struct Router {
    id: NodeId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Router {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub async fn send_data(&self, to: &str, payload: Value) -> Result<Disposition> {
        self.request(|responder| Command::SendData {
            to: to.to_string(),
            payload,
            responder,
        })
        .await?
    }

    pub async fn send_flood(&self, to: &str, payload: Value, ttl: u32) -> Result<Disposition> {
        self.request(|responder| Command::SendFlood {
            to: to.to_string(),
            payload,
            ttl,
            responder,
        })
        .await?
    }

    pub async fn advertise(&self) -> Result<usize> {
        self.request(|responder| Command::Advertise { responder })
            .await
    }

    pub async fn probe_neighbors(&self) -> Result<usize> {
        self.request(|responder| Command::ProbeNeighbors { responder })
            .await
    }

    pub async fn update_link(&self, neighbor: &str, cost: u64) -> Result<bool> {
        self.request(|responder| Command::UpdateLink {
            neighbor: neighbor.to_string(),
            cost,
            responder,
        })
        .await
    }

    pub async fn drop_link(&self, neighbor: &str) -> Result<bool> {
        self.request(|responder| Command::DropLink {
            neighbor: neighbor.to_string(),
            responder,
        })
        .await
    }

    pub async fn install_table(&self, table: RoutingTable) -> Result<()> {
        self.request(|responder| Command::InstallTable { table, responder })
            .await?
    }

    /// Snapshot of the node's current table, if its mode keeps one.
    pub async fn table(&self) -> Result<Option<RoutingTable>> {
        self.request(|responder| Command::Table { responder }).await
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| RoutingError::NodeUnavailable(self.id.clone()))?;
        rx.await
            .map_err(|_| RoutingError::NodeUnavailable(self.id.clone()))
    }
}

async fn run_node(
    mut agent: ForwardingAgent,
    mut inbox: mpsc::UnboundedReceiver<Datagram>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    directory: Directory,
) {
    let id = agent.id().clone();
    debug!("{}: node task started", id);
    loop {
        tokio::select! {
            Some(datagram) = inbox.recv() => {
                let sender = directory.node_at(&datagram.sender).cloned();
                match agent.handle_envelope(datagram.envelope, sender.as_ref()) {
                    Ok(disposition) => debug!("{}: {:?}", id, disposition),
                    Err(e) => warn!("{}: envelope handling failed: {}", id, e),
                }
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => handle_command(&mut agent, command),
                }
            }
        }
    }
    debug!("{}: node task stopped", id);
}

fn handle_command(agent: &mut ForwardingAgent, command: Command) {
    match command {
        Command::SendData { to, payload, responder } => {
            let _ = responder.send(agent.send_data(&to, payload));
        }
        Command::SendFlood { to, payload, ttl, responder } => {
            let _ = responder.send(agent.send_flood(&to, payload, ttl));
        }
        Command::Advertise { responder } => {
            let _ = responder.send(agent.advertise());
        }
        Command::ProbeNeighbors { responder } => {
            let _ = responder.send(agent.probe_neighbors());
        }
        Command::UpdateLink { neighbor, cost, responder } => {
            let _ = responder.send(agent.update_link(&neighbor, cost));
        }
        Command::DropLink { neighbor, responder } => {
            let _ = responder.send(agent.drop_link(&neighbor));
        }
        Command::InstallTable { table, responder } => {
            let _ = responder.send(agent.install_table(table));
        }
        Command::Table { responder } => {
            let _ = responder.send(agent.table().cloned());
        }
        Command::Shutdown => {}
    }
}

/// A whole topology running as one task per node, wired through the
/// in-memory channel fabric. Must be launched from within a tokio runtime.
pub struct Cluster {
    routers: BTreeMap<NodeId, Router>,
    deliveries: BTreeMap<NodeId, mpsc::UnboundedReceiver<Delivery>>,
}

impl Cluster {
    /// Spawns every configured node in the given mode. Distance-vector
    /// nodes start with their direct link costs seeded but unannounced;
    /// call `advertise_all` to kick off convergence.
    pub fn launch(config: &TopologyConfig, mode: RoutingMode) -> Result<Self> {
        let directory = config.directory();

        let mut fabric = HashMap::new();
        let mut inboxes = Vec::new();
        for node in config.node_ids() {
            let (tx, rx) = mpsc::unbounded_channel();
            fabric.insert(config.address_of(node)?.to_string(), tx);
            inboxes.push((node.clone(), rx));
        }
        let fabric = Arc::new(fabric);

        let mut routers = BTreeMap::new();
        let mut deliveries = BTreeMap::new();
        for (node, inbox) in inboxes {
            let address = config.address_of(&node)?.to_string();
            let neighbors = config.neighbors_of(&node)?;
            let neighbor_ids: Vec<NodeId> = neighbors.iter().map(|(id, _)| id.clone()).collect();

            let transport = Arc::new(ChannelTransport::new(address, fabric.clone()));
            let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
            let mut agent = ForwardingAgent::new(
                node.clone(),
                neighbor_ids,
                mode,
                transport,
                directory.clone(),
                delivery_tx,
            );
            if mode == RoutingMode::DistanceVector {
                for (neighbor, cost) in &neighbors {
                    agent.seed_link(neighbor, *cost);
                }
            }

            let (command_tx, command_rx) = mpsc::unbounded_channel();
            tokio::spawn(run_node(agent, inbox, command_rx, directory.clone()));
            routers.insert(
                node.clone(),
                Router {
                    id: node.clone(),
                    commands: command_tx,
                },
            );
            deliveries.insert(node, delivery_rx);
        }

        info!("cluster of {} nodes up ({:?} mode)", routers.len(), mode);
        Ok(Self { routers, deliveries })
    }

    pub fn router(&self, node: &str) -> Result<&Router> {
        self.routers
            .get(node)
            .ok_or_else(|| RoutingError::UnknownNode(node.to_string()))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.routers.keys()
    }

    /// Takes the delivery stream of one node. Each stream can be taken once.
    pub fn take_deliveries(&mut self, node: &str) -> Option<mpsc::UnboundedReceiver<Delivery>> {
        self.deliveries.remove(node)
    }

    /// Stops one node's task and forgets its handle. The node's inbox keeps
    /// accepting datagrams; nothing reads them anymore.
    pub fn stop(&mut self, node: &str) -> Result<()> {
        let router = self
            .routers
            .remove(node)
            .ok_or_else(|| RoutingError::UnknownNode(node.to_string()))?;
        router.shutdown();
        self.deliveries.remove(node);
        info!("{}: stopped", node);
        Ok(())
    }

    pub async fn send(&self, from: &str, to: &str, payload: Value) -> Result<Disposition> {
        self.router(from)?.send_data(to, payload).await
    }

    pub async fn flood(
        &self,
        from: &str,
        to: &str,
        payload: Value,
        ttl: u32,
    ) -> Result<Disposition> {
        self.router(from)?.send_flood(to, payload, ttl).await
    }

    /// One advertisement round from every node. Later waves follow by
    /// themselves whenever a table changes.
    pub async fn advertise_all(&self) -> Result<()> {
        for router in self.routers.values() {
            router.advertise().await?;
        }
        Ok(())
    }

    /// Every node measures its direct links once.
    pub async fn probe_all(&self) -> Result<()> {
        for router in self.routers.values() {
            router.probe_neighbors().await?;
        }
        Ok(())
    }

    /// Computes shortest paths centrally and installs the per-node tables.
    pub async fn install_tables_from(&self, graph: &Graph) -> Result<()> {
        for (node, router) in &self.routers {
            let routes = shortest_paths(graph, node)?;
            router
                .install_table(RoutingTable::from_shortest_paths(node.clone(), &routes))
                .await?;
        }
        Ok(())
    }

    pub async fn table_of(&self, node: &str) -> Result<Option<RoutingTable>> {
        self.router(node)?.table().await
    }

    /// Tears down the link between two live nodes on both ends.
    pub async fn drop_link(&self, a: &str, b: &str) -> Result<()> {
        self.router(a)?.drop_link(b).await?;
        self.router(b)?.drop_link(a).await?;
        Ok(())
    }

    /// Waits until every table stops changing, polling snapshots. Returns
    /// false when `max_wait` passes with tables still moving.
    pub async fn converge(&self, max_wait: Duration) -> Result<bool> {
        let start = Instant::now();
        let mut last: Option<Vec<(NodeId, Option<RoutingTable>)>> = None;
        let mut stable_rounds = 0;
        loop {
            let mut snapshot = Vec::with_capacity(self.routers.len());
            for (node, router) in &self.routers {
                snapshot.push((node.clone(), router.table().await?));
            }
            if last.as_ref() == Some(&snapshot) {
                stable_rounds += 1;
                if stable_rounds >= 3 {
                    return Ok(true);
                }
            } else {
                stable_rounds = 0;
                last = Some(snapshot);
            }
            if start.elapsed() > max_wait {
                warn!("tables still moving after {:?}", max_wait);
                return Ok(false);
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn shutdown(&self) {
        for router in self.routers.values() {
            router.shutdown();
        }
    }
}
