use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use serde_json::Value;
use tokio::runtime::Builder;
use tokio::time::{sleep, timeout};

use routesim::algorithms::{shortest_paths, ShortestPath};
use routesim::protocol::DEFAULT_FLOOD_TTL;
use routesim::{Cluster, RoutingMode, RoutingTable, TopologyConfig};

#[derive(Parser)]
#[command(name = "routesim")]
#[command(about = "Routing simulator: dijkstra, distance-vector and flooding over message-passing nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the topology JSON file
    #[arg(short, long, default_value = "topology.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a topology file
    Check,

    /// Compute shortest paths centrally and print the derived tables
    Dijkstra {
        /// Print paths from this node only
        #[arg(short, long)]
        source: Option<String>,

        /// Print just the path to this destination
        #[arg(long, requires = "source")]
        dest: Option<String>,

        /// Also install the tables on a live cluster and send a message
        #[arg(long, requires = "dest")]
        send: bool,

        /// Message text for --send
        #[arg(long, default_value = "ping")]
        message: String,
    },

    /// Run the distance-vector protocol until tables settle, then print them
    DistanceVector {
        /// Seconds to wait for convergence
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Send a message from this node after convergence
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Destination of the message
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Message text
        #[arg(long, default_value = "ping")]
        message: String,
    },

    /// Flood one message through the network within a hop budget
    Flood {
        /// Originating node
        #[arg(long)]
        from: String,

        /// Destination node
        #[arg(long)]
        to: String,

        /// Message text
        #[arg(long, default_value = "ping")]
        message: String,

        /// Number of links the message may cross
        #[arg(long, default_value_t = DEFAULT_FLOOD_TTL)]
        ttl: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = TopologyConfig::load(&cli.config)
        .with_context(|| format!("loading topology from {}", cli.config.display()))?;

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: TopologyConfig) -> Result<()> {
    match command {
        Commands::Check => check(&config),
        Commands::Dijkstra {
            source,
            dest,
            send,
            message,
        } => dijkstra(&config, source, dest, send, message).await,
        Commands::DistanceVector {
            timeout,
            from,
            to,
            message,
        } => distance_vector(&config, timeout, from, to, message).await,
        Commands::Flood {
            from,
            to,
            message,
            ttl,
        } => flood(&config, from, to, message, ttl).await,
    }
}

fn check(config: &TopologyConfig) -> Result<()> {
    let graph = config.build_graph()?;
    println!(
        "topology is well formed: {} nodes, {} links",
        graph.len(),
        graph.edge_count()
    );
    Ok(())
}

async fn dijkstra(
    config: &TopologyConfig,
    source: Option<String>,
    dest: Option<String>,
    send: bool,
    message: String,
) -> Result<()> {
    let graph = config.build_graph()?;

    match &source {
        None => {
            for node in config.node_ids() {
                let routes = shortest_paths(&graph, node)?;
                println!("{}", RoutingTable::from_shortest_paths(node.clone(), &routes));
            }
        }
        Some(source) => {
            let routes = shortest_paths(&graph, source)?;
            match &dest {
                Some(dest) => {
                    let route = routes
                        .get(dest)
                        .with_context(|| format!("unknown node `{dest}`"))?;
                    println!("{}", describe_route(dest, route));
                }
                None => {
                    println!("Shortest paths from {source}:");
                    for (dest, route) in &routes {
                        if dest == source {
                            continue;
                        }
                        println!("  {}", describe_route(dest, route));
                    }
                }
            }
        }
    }

    if send {
        let (Some(from), Some(to)) = (source, dest) else {
            return Ok(());
        };
        let mut cluster = Cluster::launch(config, RoutingMode::Static)?;
        cluster.install_tables_from(&graph).await?;
        let mut inbox = cluster
            .take_deliveries(&to)
            .with_context(|| format!("unknown node `{to}`"))?;

        let disposition = cluster.send(&from, &to, Value::String(message)).await?;
        println!("send from {from}: {disposition:?}");
        match timeout(Duration::from_secs(2), inbox.recv()).await {
            Ok(Some(delivery)) => println!(
                "delivered at {} after {} hops: {}",
                to, delivery.hops, delivery.payload
            ),
            _ => println!("nothing arrived at {to} within 2s"),
        }
        cluster.shutdown();
    }
    Ok(())
}

async fn distance_vector(
    config: &TopologyConfig,
    wait: u64,
    from: Option<String>,
    to: Option<String>,
    message: String,
) -> Result<()> {
    let mut cluster = Cluster::launch(config, RoutingMode::DistanceVector)?;
    cluster.advertise_all().await?;

    if cluster.converge(Duration::from_secs(wait)).await? {
        println!("=== Tables converged ===");
    } else {
        println!("=== Still moving after {wait}s, printing current state ===");
    }
    for node in config.node_ids() {
        if let Some(table) = cluster.table_of(node).await? {
            println!("{table}");
        }
    }

    if let (Some(from), Some(to)) = (from, to) {
        let mut inbox = cluster
            .take_deliveries(&to)
            .with_context(|| format!("unknown node `{to}`"))?;
        let disposition = cluster.send(&from, &to, Value::String(message)).await?;
        println!("send from {from}: {disposition:?}");
        match timeout(Duration::from_secs(2), inbox.recv()).await {
            Ok(Some(delivery)) => println!(
                "delivered at {} from {} after {} hops: {}",
                to, delivery.from, delivery.hops, delivery.payload
            ),
            _ => println!("nothing arrived at {to} within 2s"),
        }
    }

    cluster.shutdown();
    Ok(())
}

async fn flood(
    config: &TopologyConfig,
    from: String,
    to: String,
    message: String,
    ttl: u32,
) -> Result<()> {
    let mut cluster = Cluster::launch(config, RoutingMode::Flood)?;
    let mut inbox = cluster
        .take_deliveries(&to)
        .with_context(|| format!("unknown node `{to}`"))?;

    let disposition = cluster.flood(&from, &to, Value::String(message), ttl).await?;
    println!("flood from {from} with ttl {ttl}: {disposition:?}");

    // Let the wave die out before counting arrivals.
    sleep(Duration::from_millis(300)).await;

    let mut copies = 0;
    while let Ok(delivery) = inbox.try_recv() {
        copies += 1;
        println!("copy {} reached {} after {} hops", copies, to, delivery.hops);
    }
    if copies == 0 {
        println!("no copy reached {to} within the budget");
    }

    cluster.shutdown();
    Ok(())
}

fn describe_route(dest: &str, route: &ShortestPath) -> String {
    match &route.path {
        Some(path) => format!(
            "{:<12} cost {:<6} {}",
            dest,
            route.distance,
            path.join(" -> ")
        ),
        None => format!("{dest:<12} unreachable"),
    }
}
