//! API module for the lineage service

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub session_id: String,
    pub anchor_count: usize,
    pub accumulator: String,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        session_id: state.engine.session_id().to_string(),
        anchor_count: state.engine.anchors().len(),
        accumulator: state.engine.accumulator().to_hex(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration for browser-based verification clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Token endpoints (mutable store)
        .route("/v1/tokens", post(handlers::create_token))
        .route("/v1/tokens", get(handlers::list_tokens))
        .route("/v1/tokens/{id}/mutate", post(handlers::mutate_token))
        .route("/v1/tokens/{id}", delete(handlers::forget_token))
        // Audit endpoints
        .route("/v1/audit/report", get(handlers::audit_report))
        // Anchor endpoints (immutable ledger)
        .route("/v1/anchors", post(handlers::register_anchor))
        .route("/v1/anchors/{id}/deprecate", post(handlers::deprecate_anchor))
        .route("/v1/anchors/{id}/verify", get(handlers::verify_anchor))
        .route("/v1/anchors/{id}/proof", get(handlers::anchor_proof))
        .route("/v1/anchors/{id}/commitment", get(handlers::anchor_commitment))
        .route("/v1/ledger/accumulator", get(handlers::ledger_accumulator))
        .route("/v1/registry", get(handlers::registry))
        // Summary endpoint for downstream consumers
        .route("/v1/state", get(handlers::state_summary))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
