use axum::extract::connect_info::MockConnectInfo;
use axum::http::StatusCode;
use axum_test::TestServer;
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use rask_ingest::adapter::ObjectStoreForwarder;
use rask_ingest::app::main_router;
use rask_ingest::auth::JwtVerifier;
use rask_ingest::error::ForwardFailure;
use rask_ingest::pipeline::{BatchWriter, IndexPublisher, IngestionPipeline};
use rask_ingest::port::StorageForwarder;
use rask_ingest::test_support::{MockForwarder, RecordingSearchEngine, mint_token};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SECRET: &str = "handler-test-secret";
const BUCKET: &str = "logs";

const VALID_PAYLOAD: &str = "\
2025-03-15 01:56:59,303 - 127.0.0.1 - 4109 - INFO - get_dns - server.py - Querying DNS
2025-03-15 01:57:00,001 - 192.168.1.20 - 4109 - WARNING - resolve - dns.py - Slow upstream - retrying
";

struct TestApp {
    server: TestServer,
    log_dir: TempDir,
    engine: Arc<RecordingSearchEngine>,
}

impl TestApp {
    fn batch_files(&self) -> Vec<String> {
        std::fs::read_dir(self.log_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

async fn create_test_app(forwarder: Arc<dyn StorageForwarder>) -> TestApp {
    let log_dir = TempDir::new().unwrap();
    let engine = Arc::new(RecordingSearchEngine::new());
    let writer = BatchWriter::new(log_dir.path(), "logaggregator").await.unwrap();
    let pipeline = IngestionPipeline::new(
        writer,
        forwarder,
        IndexPublisher::new(engine.clone(), "logaggregator"),
        BUCKET,
    );

    let app = main_router(Arc::new(pipeline), Arc::new(JwtVerifier::hs256(SECRET)))
        .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 5], 41000))));

    TestApp {
        server: TestServer::new(app).unwrap(),
        log_dir,
        engine,
    }
}

fn in_memory_forwarder() -> (Arc<InMemory>, Arc<dyn StorageForwarder>) {
    let store = Arc::new(InMemory::new());
    let forwarder = ObjectStoreForwarder::new(BUCKET, store.clone(), Duration::from_secs(5));
    (store, Arc::new(forwarder))
}

#[tokio::test]
async fn test_health_endpoint_returns_healthy() {
    let app = create_test_app(Arc::new(MockForwarder::new())).await;

    let response = app.server.get("/v1/health").await;

    response.assert_status_ok();
    response.assert_text("Healthy");
}

#[tokio::test]
async fn test_online_probe_needs_no_token() {
    let app = create_test_app(Arc::new(MockForwarder::new())).await;

    let response = app.server.get("/").await;

    response.assert_status_ok();
    response.assert_text("LogAggregator is online");
}

#[tokio::test]
async fn test_valid_token_ingests_forwards_and_cleans_up() {
    let (store, forwarder) = in_memory_forwarder();
    let app = create_test_app(forwarder).await;
    let token = mint_token(SECRET, &["log"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(VALID_PAYLOAD)
        .await;

    response.assert_status_ok();
    response.assert_text("Log received from 10.0.0.5");

    // Forwarded, then removed locally.
    assert!(app.batch_files().is_empty());
    let listing = store.list_with_delimiter(None).await.unwrap();
    assert_eq!(listing.objects.len(), 1);
    let name = listing.objects[0].location.to_string();
    assert!(name.starts_with("logaggregator_"));
    assert!(name.ends_with("_1.log"));

    let stored = store
        .get(&ObjectPath::from(name))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let lines: Vec<serde_json::Value> = std::str::from_utf8(&stored)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["origin_ip"], "10.0.0.5");
    assert_eq!(lines[0]["message"], "Querying DNS");
    assert_eq!(lines[1]["level"], "WARNING");
    assert_eq!(lines[1]["message"], "Slow upstream - retrying");

    let bulks = app.engine.bulk_requests();
    assert_eq!(bulks.len(), 1);
    assert_eq!(bulks[0].0, "logaggregator-2025-03-15");
}

#[tokio::test]
async fn test_missing_token_is_rejected_before_anything_is_written() {
    let forwarder = Arc::new(MockForwarder::new());
    let app = create_test_app(forwarder.clone()).await;

    let response = app.server.post("/log").text(VALID_PAYLOAD).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "authorization_error");
    assert!(app.batch_files().is_empty());
    assert!(forwarder.uploads().is_empty());
}

#[tokio::test]
async fn test_token_without_log_permission_is_rejected() {
    let forwarder = Arc::new(MockForwarder::new());
    let app = create_test_app(forwarder.clone()).await;
    let token = mint_token(SECRET, &["read"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(VALID_PAYLOAD)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(forwarder.uploads().is_empty());
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = create_test_app(Arc::new(MockForwarder::new())).await;
    let token = mint_token(SECRET, &["log"], -300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(VALID_PAYLOAD)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_line_rejects_whole_payload() {
    let forwarder = Arc::new(MockForwarder::new());
    let app = create_test_app(forwarder.clone()).await;
    let token = mint_token(SECRET, &["log"], 300);
    let payload = format!("{VALID_PAYLOAD}not a log line\n");

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(payload)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "parse_error");
    assert!(body["message"].as_str().unwrap().contains("line 3"));
    assert!(app.batch_files().is_empty());
    assert!(forwarder.uploads().is_empty());
}

#[tokio::test]
async fn test_invalid_client_ip_is_validation_error() {
    let app = create_test_app(Arc::new(MockForwarder::new())).await;
    let token = mint_token(SECRET, &["log"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text("2025-03-15 01:56:59,303 - 999.0.0.1 - 4109 - INFO - m - c.py - msg")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_forward_failure_returns_500_and_keeps_file() {
    let app = create_test_app(Arc::new(MockForwarder::failing(
        ForwardFailure::Unauthenticated,
    )))
    .await;
    let token = mint_token(SECRET, &["log"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(VALID_PAYLOAD)
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "forward_error");

    let files = app.batch_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_1.log"));
    assert!(app.engine.bulk_requests().is_empty());
}

#[tokio::test]
async fn test_index_failure_returns_500() {
    let (_store, forwarder) = in_memory_forwarder();
    let app = create_test_app(forwarder).await;
    app.engine.fail_bulk_with(503);
    let token = mint_token(SECRET, &["log"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text(VALID_PAYLOAD)
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "index_error");
}

#[tokio::test]
async fn test_empty_body_is_accepted() {
    let forwarder = Arc::new(MockForwarder::new());
    let app = create_test_app(forwarder.clone()).await;
    let token = mint_token(SECRET, &["log"], 300);

    let response = app
        .server
        .post("/log")
        .authorization_bearer(token)
        .text("")
        .await;

    response.assert_status_ok();
    assert!(app.batch_files().is_empty());
    assert!(forwarder.uploads().is_empty());
}

#[tokio::test]
async fn test_sequential_requests_get_increasing_sequence() {
    let forwarder = Arc::new(MockForwarder::new());
    let app = create_test_app(forwarder.clone()).await;
    let token = mint_token(SECRET, &["log"], 300);

    for _ in 0..3 {
        app.server
            .post("/log")
            .authorization_bearer(token.clone())
            .text(VALID_PAYLOAD)
            .await
            .assert_status_ok();
    }

    let names: Vec<String> = forwarder.uploads().into_iter().map(|u| u.object).collect();
    assert_eq!(names.len(), 3);
    for (i, name) in names.iter().enumerate() {
        assert!(name.ends_with(&format!("_{}.log", i + 1)), "{name}");
    }
}
