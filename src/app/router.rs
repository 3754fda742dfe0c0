use crate::auth::{ClaimGate, JwtVerifier, Operation, authorize};
use crate::handler::health::{health_handler, online_handler};
use crate::handler::log::log_handler;
use crate::pipeline::IngestionPipeline;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::sync::Arc;

/// Build the HTTP router (online probe + health + authorized log ingestion).
pub fn main_router(pipeline: Arc<IngestionPipeline>, verifier: Arc<JwtVerifier>) -> Router {
    let probe_router = Router::new()
        .route("/", get(online_handler))
        .route("/v1/health", get(health_handler));

    let log_router = Router::new()
        .route("/log", post(log_handler))
        .route_layer(middleware::from_fn_with_state(
            ClaimGate::new(verifier, Operation::IngestLog),
            authorize,
        ))
        .with_state(pipeline);

    Router::new().merge(probe_router).merge(log_router)
}
