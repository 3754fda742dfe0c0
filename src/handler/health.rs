use crate::healthcheck::HEALTHY_BODY;
use tracing::{debug, info};

/// Handler for GET /v1/health
pub async fn health_handler() -> &'static str {
    info!("Health check requested");
    HEALTHY_BODY
}

/// Handler for GET /
pub async fn online_handler() -> &'static str {
    debug!("Online probe requested");
    "LogAggregator is online"
}
