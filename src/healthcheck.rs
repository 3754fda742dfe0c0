//! `rask-ingest healthcheck`: check a running instance from inside its own
//! container, where no shell or curl is available.

use std::time::Duration;
use thiserror::Error;

const DEFAULT_HTTP_PORT: u16 = 8080;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Body `GET /v1/health` answers with.
pub const HEALTHY_BODY: &str = "Healthy";

#[derive(Error, Debug)]
pub enum HealthcheckError {
    #[error("Healthcheck failed: could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Healthcheck failed: request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Healthcheck failed: {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Something answered on the port, but not this service.
    #[error("Healthcheck failed: {url} answered '{body}' instead of 'Healthy'")]
    UnexpectedBody { url: String, body: String },
}

/// Check `HTTP_PORT`, or 8080 when it is unset or unparsable.
pub async fn healthcheck() -> Result<(), HealthcheckError> {
    let port = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_HTTP_PORT);
    healthcheck_with_port(port).await
}

pub async fn healthcheck_with_port(port: u16) -> Result<(), HealthcheckError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(HealthcheckError::Client)?;

    let url = format!("http://127.0.0.1:{port}/v1/health");
    let request_failed = |source| HealthcheckError::Request {
        url: url.clone(),
        source,
    };

    let resp = client.get(&url).send().await.map_err(request_failed)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(HealthcheckError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let body = resp.text().await.map_err(request_failed)?;
    if body.trim() != HEALTHY_BODY {
        return Err(HealthcheckError::UnexpectedBody { url, body });
    }
    Ok(())
}
