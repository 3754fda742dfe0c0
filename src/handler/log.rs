use crate::error::IngestError;
use crate::pipeline::IngestionPipeline;
use axum::extract::{ConnectInfo, State};
use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;

/// Handler for POST /log (raw dash-separated log lines from a forwarder)
pub async fn log_handler(
    State(pipeline): State<Arc<IngestionPipeline>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<String, IngestError> {
    let origin = origin_ip(peer);
    info!(origin = %origin, bytes = body.len(), "Received log payload");

    pipeline.ingest(&origin.to_string(), &body).await?;
    Ok(format!("Log received from {origin}"))
}

/// Peer address with IPv4-mapped IPv6 (dual-stack listeners) unwrapped to IPv4.
fn origin_ip(peer: SocketAddr) -> IpAddr {
    match peer.ip() {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        ip => ip,
    }
}
