//! The REST client against the served persistence store.

use std::net::SocketAddr;
use std::sync::Arc;

use epochal_markets::api::store_router;
use epochal_markets::backend::{BackendClient, InMemoryMarketStore, MarketRecord, MarketStore};
use epochal_markets::error::BackendError;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

async fn serve() -> (BackendClient, Arc<InMemoryMarketStore>) {
    let store = Arc::new(InMemoryMarketStore::new());
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let router = store_router(store.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = BackendClient::new(&format!("http://{addr}/api")).unwrap();
    (client, store)
}

fn row(id: &str, start: i64) -> MarketRecord {
    let mut record = MarketRecord::new(id, "Arsenal", "Chelsea");
    record.match_start_time = Some(start);
    record.league_name = Some("English Premier League".into());
    record
}

#[tokio::test]
async fn upsert_get_and_find() {
    let (client, store) = serve().await;

    client.upsert(&row("m1", 100)).await.unwrap();
    assert_eq!(store.len(), 1);

    let got = client.get("m1").await.unwrap().unwrap();
    assert_eq!(got.team1, "Arsenal");
    assert_eq!(got.league_name.as_deref(), Some("English Premier League"));
    assert!(got.created_at.is_some());

    assert!(client.get("missing").await.unwrap().is_none());

    let found = client
        .find_by_match("Arsenal", "Chelsea", 100)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "m1");
    assert!(client
        .find_by_match("Arsenal", "Chelsea", 101)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn recent_lists_newest_first() {
    let (client, _store) = serve().await;
    for i in 0..3 {
        client.upsert(&row(&format!("m{i}"), 100 + i)).await.unwrap();
    }
    // Replacing a row moves it to the front.
    client.upsert(&row("m0", 100)).await.unwrap();

    let ids: Vec<String> = client
        .recent()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["m0", "m2", "m1"]);
}

#[tokio::test]
async fn incomplete_record_is_rejected_locally() {
    let (client, store) = serve().await;
    let err = client
        .upsert(&MarketRecord::new("m1", "Arsenal", " "))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::InvalidRecord(_)));
    assert!(store.is_empty());
}
