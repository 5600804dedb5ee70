//! Public HTTP API of the front-end
//!
//! - `GET    /api/votes`        global tally `{votes, totalBallots}`
//! - `PUT    /api/votes/:name`  cast a vote on the owning partition
//! - `DELETE /api/votes/:name`  delete an item on the owning partition
//! - `GET    /api/appVersion`   running version
//! - `GET    /api/currentNode`  node serving the request
//! - `GET    /health`           liveness

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::Result;
use crate::web::aggregator::{Aggregator, GlobalTally};
use crate::web::partition_client::Reply;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

#[derive(Clone)]
pub struct WebState {
    pub aggregator: Arc<Aggregator>,
    pub node_id: String,
}

/// `request_timeout` bounds a whole front-end request, across all the
/// partition calls it makes.
pub fn create_router(state: WebState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/votes", get(get_votes))
        .route("/api/votes/:name", put(put_vote).delete(delete_vote))
        .route("/api/appVersion", get(app_version))
        .route("/api/currentNode", get(current_node))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

async fn get_votes(State(state): State<WebState>) -> Result<Json<GlobalTally>> {
    Ok(Json(state.aggregator.get_global_tally().await?))
}

async fn put_vote(State(state): State<WebState>, Path(name): Path<String>) -> Result<Response> {
    let reply = state.aggregator.cast_vote(&name).await?;
    Ok(reply_response(reply))
}

async fn delete_vote(
    State(state): State<WebState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let reply = state.aggregator.delete_vote(&name).await?;
    Ok(reply_response(reply))
}

/// Relay the partition's answer: 200 on success, its own status and body otherwise
fn reply_response(reply: Reply<()>) -> Response {
    match reply {
        Ok(()) => StatusCode::OK.into_response(),
        Err(rejection) => (rejection.status, rejection.body).into_response(),
    }
}

async fn app_version() -> &'static str {
    crate::VERSION
}

async fn current_node(State(state): State<WebState>) -> String {
    state.node_id.clone()
}

async fn health(State(state): State<WebState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "node_id": state.node_id,
        "service": state.aggregator.service(),
        "version": crate::VERSION,
    }))
}
