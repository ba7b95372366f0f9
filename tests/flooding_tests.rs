//! Controlled flooding on live clusters: duplicate arrivals over disjoint
//! paths, budget expiry and provenance suppression.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use routesim::{Cluster, Disposition, DropReason, RoutingMode};

#[tokio::test]
async fn both_corners_of_the_square_relay_a_copy() {
    let config = common::square();
    let mut cluster = Cluster::launch(&config, RoutingMode::Flood).unwrap();
    let mut arrivals = cluster.take_deliveries("C").unwrap();

    let disposition = cluster.flood("A", "C", json!("wave"), 4).await.unwrap();
    assert_eq!(disposition, Disposition::Flooded { copies: 2 });

    sleep(Duration::from_millis(300)).await;

    let mut copies = Vec::new();
    while let Ok(delivery) = arrivals.try_recv() {
        copies.push(delivery);
    }
    // One copy through B, one through D; neither relays back towards A.
    assert_eq!(copies.len(), 2);
    assert!(copies.iter().all(|d| d.hops == 1 && d.from == "A"));

    cluster.shutdown();
}

#[tokio::test]
async fn a_spent_budget_dies_short_of_the_destination() {
    let config = common::line();
    let mut cluster = Cluster::launch(&config, RoutingMode::Flood).unwrap();
    let mut arrivals = cluster.take_deliveries("C").unwrap();

    // Two links to cross, budget for one: the copy expires on arrival at C.
    cluster.flood("A", "C", json!("too far"), 1).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(arrivals.try_recv().is_err());

    cluster.flood("A", "C", json!("far enough"), 2).await.unwrap();
    sleep(Duration::from_millis(300)).await;
    let delivery = arrivals.try_recv().unwrap();
    assert_eq!(delivery.hops, 1);

    cluster.shutdown();
}

#[tokio::test]
async fn a_zero_budget_never_leaves_the_origin() {
    let config = common::line();
    let mut cluster = Cluster::launch(&config, RoutingMode::Flood).unwrap();
    let mut at_b = cluster.take_deliveries("B").unwrap();

    let disposition = cluster.flood("A", "B", json!("stillborn"), 0).await.unwrap();
    assert_eq!(disposition, Disposition::Dropped(DropReason::TtlExpired));

    sleep(Duration::from_millis(200)).await;
    assert!(at_b.try_recv().is_err());

    cluster.shutdown();
}
