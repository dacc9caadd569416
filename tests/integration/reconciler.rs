//! Reconciler behavior across seed, feed, chain and timers.

use std::time::Duration;

use epochal_markets::backend::MarketStore;
use epochal_markets::market::{seed_markets, Category, EventType, Market};
use epochal_markets::reconciler::ReconcilerConfig;
use pretty_assertions::assert_eq;

use crate::common::{record, World, NOW};

fn ids(markets: &[Market]) -> Vec<&str> {
    markets.iter().map(|m| m.id.as_str()).collect()
}

#[tokio::test]
async fn seed_views_are_filtered_and_sorted() {
    let world = World::new();
    world.reconciler.seed(seed_markets(NOW));

    assert_eq!(ids(&world.reconciler.view(Category::Live)), vec!["3", "2", "1", "4"]);
    assert_eq!(ids(&world.reconciler.view(Category::Upcoming)), vec!["5", "6"]);
    assert_eq!(
        ids(&world.reconciler.view(Category::Resolved)),
        vec!["9", "12", "10", "11"]
    );
    assert!(world.reconciler.get("7").is_none());
}

#[tokio::test]
async fn feed_refreshes_rows_but_keeps_resolution() {
    let world = World::new();
    let address = world.deploy("Arsenal", "Chelsea", NOW - 7200);
    let id = address.to_string();
    world
        .store
        .upsert(&record(address, "Arsenal", "Chelsea", NOW - 7200))
        .await
        .unwrap();
    world.reconciler.poll_once().await.unwrap();

    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 1, 1);
    }
    world.reconciler.check_resolution(&id).await;

    // Backend row changes the display name and knows nothing of results.
    let mut renamed = record(address, "Arsenal FC", "Chelsea", NOW - 7200);
    renamed.image = Some("ars.png".into());
    world.store.upsert(&renamed).await.unwrap();
    world.reconciler.poll_once().await.unwrap();

    let market = world.reconciler.get(&id).unwrap();
    assert_eq!(market.team1, "Arsenal FC");
    assert_eq!(market.image, "ars.png");
    assert_eq!(market.status, Some(Category::Resolved));
    let results = market.epoch_results.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].goal_team, "Chelsea");
}

#[tokio::test]
async fn resolution_only_grows() {
    let world = World::new();
    let address = world.deploy("Inter", "Milan", NOW - 7200);
    let id = address.to_string();
    world.reconciler.seed(vec![
        Market::new(id.clone(), "Inter", "Milan").with_start_time(NOW - 7200)
    ]);

    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 1, 0);
    }
    assert!(world.reconciler.check_resolution(&id).await);
    // Nothing new on chain: no change.
    assert!(!world.reconciler.check_resolution(&id).await);

    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 2, 1);
    }
    assert!(world.reconciler.check_resolution(&id).await);

    let results = world.reconciler.get(&id).unwrap().epoch_results.unwrap();
    let epochs: Vec<u8> = results.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![1, 2]);
    assert_eq!(results[0].goal_team, "Inter");
    assert_eq!(world.reconciler.stats().markets_resolved, 1);
}

#[tokio::test]
async fn failed_pool_reads_leave_market_live() {
    let world = World::new();
    let address = world.deploy("Inter", "Milan", NOW - 3000);
    let id = address.to_string();
    world
        .store
        .upsert(&record(address, "Inter", "Milan", NOW - 3000))
        .await
        .unwrap();
    world.reconciler.poll_once().await.unwrap();
    world.chain.fail_pool_reads(address);

    assert!(!world.reconciler.check_resolution(&id).await);
    assert_eq!(world.reconciler.get(&id).unwrap().status, None);
    assert_eq!(ids(&world.reconciler.view(Category::Live)), vec![id.as_str()]);
}

#[tokio::test(start_paused = true)]
async fn timers_poll_and_resolve_in_background() {
    let world = World::with_config(ReconcilerConfig {
        poll_interval: Duration::from_secs(5),
        recategorize_interval: Duration::from_secs(15),
        max_concurrent_checks: 2,
    });
    let address = world.deploy("Ajax", "PSV", NOW - 7200);
    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 3, 0);
    }
    world
        .store
        .upsert(&record(address, "Ajax", "PSV", NOW - 7200))
        .await
        .unwrap();

    let mut rx = world.reconciler.subscribe();
    world.reconciler.start();

    let id = address.to_string();
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let resolved = rx
                .borrow_and_update()
                .iter()
                .any(|m| m.id == id && m.status == Some(Category::Resolved));
            if resolved {
                break;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("market resolved by background check");

    world.reconciler.shutdown().await;
    assert!(world.reconciler.is_shut_down());
    assert_eq!(world.reconciler.checks_in_flight(), 0);
    assert!(world.reconciler.stats().polls >= 1);
}

#[tokio::test(start_paused = true)]
async fn recategorize_timer_moves_markets_to_live() {
    let world = World::new();
    world
        .reconciler
        .seed(vec![Market::new("m", "A", "B").with_start_time(NOW + 10)]);
    world.reconciler.start();

    world.clock.advance(20);
    tokio::time::sleep(Duration::from_secs(16)).await;

    assert_eq!(world.reconciler.get("m").unwrap().page, Some(Category::Live));
    world.reconciler.shutdown().await;
}

#[tokio::test]
async fn shutdown_discards_late_results() {
    let world = World::new();
    let address = world.deploy("Ajax", "PSV", NOW - 7200);
    let id = address.to_string();
    world
        .store
        .upsert(&record(address, "Ajax", "PSV", NOW - 7200))
        .await
        .unwrap();
    world.reconciler.poll_once().await.unwrap();
    world.reconciler.shutdown().await;

    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 1, 0);
    }
    assert!(!world.reconciler.check_resolution(&id).await);
    assert_eq!(world.reconciler.get(&id).unwrap().status, None);
}
