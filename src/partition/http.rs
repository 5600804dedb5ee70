//! Partition-local HTTP API
//!
//! - `GET    /votes`          all counters as `[{name, count}]`
//! - `GET    /votes/ballots`  ballot ledger as a plain integer
//! - `GET    /votes/:name`    one counter (404 when absent)
//! - `PUT    /votes/:name`    add one vote
//! - `POST   /votes`          add one ballot to the ledger
//! - `DELETE /votes/:name`    remove a counter and back it out of the ledger
//! - `GET    /health`         latest integrity health report
//!
//! Every route accepts the gateway's `PartitionKey` / `PartitionKind` query
//! parameters and rejects requests addressed to another partition.

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result};
use crate::partition::integrity::{HealthBoard, HealthReport};
use crate::partition::store::{CounterStore, VoteCount};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Partition kind expected in routed requests
pub const PARTITION_KIND: &str = "Int64Range";

/// Reserved path segment; a vote item with this name is served by the
/// `/votes/ballots` route's PUT and DELETE handlers.
const BALLOTS_SEGMENT: &str = "ballots";

#[derive(Clone)]
pub struct PartitionState {
    pub store: CounterStore,
    pub health: Arc<HealthBoard>,
    pub low_key: i64,
    pub high_key: i64,
}

/// Routing parameters added by the gateway / front-end
#[derive(Debug, Default, Deserialize)]
pub struct RoutingQuery {
    #[serde(rename = "PartitionKey")]
    pub partition_key: Option<i64>,
    #[serde(rename = "PartitionKind")]
    pub partition_kind: Option<String>,
}

impl PartitionState {
    fn check_route(&self, query: &RoutingQuery) -> Result<()> {
        if let Some(kind) = &query.partition_kind {
            if kind != PARTITION_KIND {
                return Err(Error::InvalidInput(format!(
                    "unsupported partition kind {}",
                    kind
                )));
            }
        }
        if let Some(key) = query.partition_key {
            if !(self.low_key..=self.high_key).contains(&key) {
                return Err(Error::Misrouted {
                    key,
                    low: self.low_key,
                    high: self.high_key,
                });
            }
        }
        Ok(())
    }
}

pub fn create_router(state: PartitionState) -> Router {
    Router::new()
        .route("/votes", get(list_votes).post(post_ballot))
        .route(
            "/votes/ballots",
            get(get_ballots).put(put_ballots_item).delete(delete_ballots_item),
        )
        .route(
            "/votes/:name",
            get(get_vote).put(put_vote).delete(delete_vote),
        )
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

async fn list_votes(
    State(state): State<PartitionState>,
    Query(query): Query<RoutingQuery>,
) -> Result<Json<Vec<VoteCount>>> {
    state.check_route(&query)?;
    Ok(Json(state.store.list_all()?))
}

async fn get_ballots(
    State(state): State<PartitionState>,
    Query(query): Query<RoutingQuery>,
) -> Result<String> {
    state.check_route(&query)?;
    Ok(state.store.get_ballots()?.to_string())
}

async fn get_vote(
    State(state): State<PartitionState>,
    Path(name): Path<String>,
    Query(query): Query<RoutingQuery>,
) -> Result<Json<VoteCount>> {
    state.check_route(&query)?;
    match state.store.get(&name)? {
        Some(count) => Ok(Json(VoteCount::new(name, count))),
        None => Err(Error::NotFound(name)),
    }
}

async fn put_vote(
    State(state): State<PartitionState>,
    Path(name): Path<String>,
    Query(query): Query<RoutingQuery>,
) -> Result<String> {
    record_vote(&state, &name, &query)
}

async fn put_ballots_item(
    State(state): State<PartitionState>,
    Query(query): Query<RoutingQuery>,
) -> Result<String> {
    record_vote(&state, BALLOTS_SEGMENT, &query)
}

fn record_vote(state: &PartitionState, name: &str, query: &RoutingQuery) -> Result<String> {
    state.check_route(query)?;
    let count = state.store.increment(name)?;
    Ok(count.to_string())
}

async fn post_ballot(
    State(state): State<PartitionState>,
    Query(query): Query<RoutingQuery>,
) -> Result<String> {
    state.check_route(&query)?;
    Ok(state.store.adjust_ballots(1)?.to_string())
}

async fn delete_vote(
    State(state): State<PartitionState>,
    Path(name): Path<String>,
    Query(query): Query<RoutingQuery>,
) -> Result<StatusCode> {
    remove_vote(&state, &name, &query)
}

async fn delete_ballots_item(
    State(state): State<PartitionState>,
    Query(query): Query<RoutingQuery>,
) -> Result<StatusCode> {
    remove_vote(&state, BALLOTS_SEGMENT, &query)
}

fn remove_vote(state: &PartitionState, name: &str, query: &RoutingQuery) -> Result<StatusCode> {
    state.check_route(query)?;
    let removal = state.store.remove_vote(name)?;
    tracing::info!(
        name,
        removed = removal.removed,
        backed_out = removal.backed_out,
        "Vote item deleted"
    );
    Ok(StatusCode::OK)
}

async fn health(State(state): State<PartitionState>) -> Json<HealthReport> {
    Json(state.health.latest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::engine::MemEngine;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        create_router(PartitionState {
            store: CounterStore::new(Arc::new(MemEngine::new())),
            health: Arc::new(HealthBoard::new()),
            low_key: 0,
            high_key: 5,
        })
    }

    async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_vote_lifecycle() {
        let router = test_router();

        assert_eq!(send(&router, Method::PUT, "/votes/Coke").await.0, StatusCode::OK);
        assert_eq!(send(&router, Method::POST, "/votes").await.0, StatusCode::OK);

        let (status, body) = send(&router, Method::GET, "/votes/Coke").await;
        assert_eq!(status, StatusCode::OK);
        let vote: VoteCount = serde_json::from_str(&body).unwrap();
        assert_eq!(vote, VoteCount::new("Coke", 1));

        assert_eq!(send(&router, Method::GET, "/votes/ballots").await.1, "1");
        assert_eq!(
            send(&router, Method::DELETE, "/votes/Coke").await.0,
            StatusCode::OK
        );
        assert_eq!(send(&router, Method::GET, "/votes/ballots").await.1, "0");
        assert_eq!(
            send(&router, Method::GET, "/votes/Coke").await.0,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_404() {
        let router = test_router();
        for _ in 0..2 {
            assert_eq!(
                send(&router, Method::DELETE, "/votes/Ghost").await.0,
                StatusCode::NOT_FOUND
            );
        }
    }

    #[tokio::test]
    async fn test_item_named_ballots() {
        let router = test_router();
        assert_eq!(
            send(&router, Method::PUT, "/votes/ballots").await.0,
            StatusCode::OK
        );
        let (_, body) = send(&router, Method::GET, "/votes").await;
        let votes: Vec<VoteCount> = serde_json::from_str(&body).unwrap();
        assert_eq!(votes, vec![VoteCount::new("ballots", 1)]);
        assert_eq!(
            send(&router, Method::DELETE, "/votes/ballots").await.0,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_routing_query_checked() {
        let router = test_router();
        assert_eq!(
            send(
                &router,
                Method::GET,
                "/votes?PartitionKey=3&PartitionKind=Int64Range"
            )
            .await
            .0,
            StatusCode::OK
        );
        assert_eq!(
            send(&router, Method::PUT, "/votes/Zebra?PartitionKey=25")
                .await
                .0,
            StatusCode::MISDIRECTED_REQUEST
        );
        assert_eq!(
            send(&router, Method::GET, "/votes?PartitionKind=Named")
                .await
                .0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = test_router();
        let (status, body) = send(&router, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let report: HealthReport = serde_json::from_str(&body).unwrap();
        assert_eq!(report.state, crate::partition::integrity::HealthState::Ok);
    }
}
