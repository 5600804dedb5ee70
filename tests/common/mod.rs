//! Shared helpers: in-process partitions and front-ends on ephemeral ports

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use votetally::common::PartitionDescriptor;
use votetally::partition::engine::MemEngine;
use votetally::partition::http::{create_router, PartitionState};
use votetally::partition::integrity::HealthBoard;
use votetally::partition::CounterStore;
use votetally::web::http::{self as web_http, WebState};
use votetally::web::locator::StaticDirectory;
use votetally::web::partition_client::PartitionClient;
use votetally::web::Aggregator;

pub const SERVICE: &str = "VotingData";

pub struct TestPartition {
    pub url: String,
    pub store: CounterStore,
    pub engine: Arc<MemEngine>,
    pub descriptor: PartitionDescriptor,
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_partition(low_key: i64, high_key: i64) -> TestPartition {
    let engine = Arc::new(MemEngine::new());
    let store = CounterStore::new(engine.clone());
    let router = create_router(PartitionState {
        store: store.clone(),
        health: Arc::new(HealthBoard::new()),
        low_key,
        high_key,
    });
    let url = serve(router).await;
    TestPartition {
        descriptor: PartitionDescriptor::new(low_key, high_key, url.clone()),
        url,
        store,
        engine,
    }
}

/// A partition that accepts connections but never answers in time
pub async fn spawn_hanging_partition(low_key: i64, high_key: i64) -> PartitionDescriptor {
    let router = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        "too late"
    });
    PartitionDescriptor::new(low_key, high_key, serve(router).await)
}

pub fn aggregator(partitions: Vec<PartitionDescriptor>, timeout: Duration) -> Aggregator {
    Aggregator::new(
        Arc::new(StaticDirectory::new().with_service(SERVICE, partitions)),
        PartitionClient::new(timeout).unwrap(),
        SERVICE,
    )
}

pub async fn spawn_web(partitions: Vec<PartitionDescriptor>, timeout: Duration) -> String {
    let router = web_http::create_router(
        WebState {
            aggregator: Arc::new(aggregator(partitions, timeout)),
            node_id: "web-test".to_string(),
        },
        timeout * 3,
    );
    serve(router).await
}
