//! Shared test support utilities
//!
//! In-process doubles for the two outbound ports plus a token minter, for use
//! in unit and integration tests.

use crate::auth::Claims;
use crate::error::{ForwardError, ForwardFailure, IndexError};
use crate::port::{SearchEngine, StorageForwarder};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;

/// One upload observed by [`MockForwarder`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub bucket: String,
    pub object: String,
    pub content: String,
}

/// Storage forwarder that reads the local file and records it, or fails on demand.
pub struct MockForwarder {
    uploads: Mutex<Vec<Upload>>,
    failure: Mutex<Option<ForwardFailure>>,
}

impl MockForwarder {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn failing(kind: ForwardFailure) -> Self {
        let forwarder = Self::new();
        forwarder.set_failure(Some(kind));
        forwarder
    }

    pub fn set_failure(&self, kind: Option<ForwardFailure>) {
        *self.failure.lock().unwrap() = kind;
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

impl Default for MockForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageForwarder for MockForwarder {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        bucket: &'a str,
        object_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ForwardError>> + Send + 'a>> {
        Box::pin(async move {
            let failure = *self.failure.lock().unwrap();
            if let Some(kind) = failure {
                return Err(ForwardError {
                    kind,
                    bucket: bucket.to_string(),
                    object: object_name.to_string(),
                    message: "mock upload failure".to_string(),
                });
            }
            let content = tokio::fs::read_to_string(local_path)
                .await
                .map_err(|e| ForwardError {
                    kind: ForwardFailure::NotFound,
                    bucket: bucket.to_string(),
                    object: object_name.to_string(),
                    message: e.to_string(),
                })?;
            self.uploads.lock().unwrap().push(Upload {
                bucket: bucket.to_string(),
                object: object_name.to_string(),
                content,
            });
            Ok(())
        })
    }
}

#[derive(Default)]
struct EngineState {
    indexes: HashSet<String>,
    created: Vec<String>,
    bulks: Vec<(String, String)>,
    bulk_response: Option<Value>,
    fail_exists: Option<u16>,
    fail_create: Option<u16>,
    fail_bulk: Option<u16>,
}

/// Search engine that keeps indexes in memory and records every bulk body.
pub struct RecordingSearchEngine {
    state: Mutex<EngineState>,
}

impl RecordingSearchEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn created_indexes(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    /// `(index, body)` for every bulk call, in order.
    pub fn bulk_requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().bulks.clone()
    }

    pub fn set_bulk_response(&self, response: Value) {
        self.state.lock().unwrap().bulk_response = Some(response);
    }

    pub fn fail_exists_with(&self, status: u16) {
        self.state.lock().unwrap().fail_exists = Some(status);
    }

    pub fn fail_create_with(&self, status: u16) {
        self.state.lock().unwrap().fail_create = Some(status);
    }

    pub fn fail_bulk_with(&self, status: u16) {
        self.state.lock().unwrap().fail_bulk = Some(status);
    }
}

impl Default for RecordingSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(operation: &'static str, index: &str, status: u16) -> IndexError {
    IndexError::Rejected {
        operation,
        index: index.to_string(),
        status,
        body: "mock rejection".to_string(),
    }
}

impl SearchEngine for RecordingSearchEngine {
    fn index_exists<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, IndexError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            match state.fail_exists {
                Some(status) => Err(rejected("index query", index, status)),
                None => Ok(state.indexes.contains(index)),
            }
        })
    }

    fn create_index<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), IndexError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some(status) = state.fail_create {
                return Err(rejected("index creation", index, status));
            }
            if state.indexes.insert(index.to_string()) {
                state.created.push(index.to_string());
            }
            Ok(())
        })
    }

    fn bulk<'a>(
        &'a self,
        index: &'a str,
        body: String,
    ) -> Pin<Box<dyn Future<Output = Result<Value, IndexError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some(status) = state.fail_bulk {
                return Err(rejected("bulk", index, status));
            }
            state.bulks.push((index.to_string(), body));
            Ok(state
                .bulk_response
                .clone()
                .unwrap_or_else(|| json!({"took": 1, "errors": false, "items": []})))
        })
    }
}

/// HS256 token carrying `perm`, expiring `expires_in_secs` from now (negative for already expired).
pub fn mint_token(secret: &str, perm: &[&str], expires_in_secs: i64) -> String {
    let claims = Claims {
        sub: "forwarder".to_string(),
        exp: chrono::Utc::now().timestamp() + expires_in_secs,
        perm: perm.iter().map(|p| p.to_string()).collect(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
