//! Publishes parsed entries into date-bucketed search indexes.
//!
//! Each publish first makes sure the bucket index exists (query, then create
//! only on a 404) and then submits every entry in one bulk request. Running the
//! ensure step twice for the same bucket creates the index at most once.

use crate::domain::LogEntry;
use crate::error::IndexError;
use crate::port::SearchEngine;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_INDEX_PREFIX: &str = "logaggregator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Existed,
    Created,
}

/// Outcome of one bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResult {
    pub index: String,
    pub status: IndexStatus,
    pub documents: usize,
    /// `errors` flag reported by the bulk API for individual items.
    pub item_errors: bool,
    pub acknowledgement: Value,
}

pub struct IndexPublisher {
    engine: Arc<dyn SearchEngine>,
    prefix: String,
}

impl IndexPublisher {
    pub fn new(engine: Arc<dyn SearchEngine>, prefix: impl Into<String>) -> Self {
        Self {
            engine,
            prefix: prefix.into(),
        }
    }

    /// `<prefix>-<date>`
    pub fn index_name(&self, date: &str) -> String {
        format!("{}-{}", self.prefix, date)
    }

    pub async fn ensure_index(&self, bucket_id: &str) -> Result<IndexStatus, IndexError> {
        if self.engine.index_exists(bucket_id).await? {
            debug!(index = bucket_id, "Index already exists");
            return Ok(IndexStatus::Existed);
        }
        self.engine.create_index(bucket_id).await?;
        info!(index = bucket_id, "Created index");
        Ok(IndexStatus::Created)
    }

    /// Ensure `bucket_id` exists, then bulk-index `entries` into it.
    pub async fn publish(
        &self,
        bucket_id: &str,
        entries: &[LogEntry],
    ) -> Result<IndexResult, IndexError> {
        let status = self.ensure_index(bucket_id).await?;

        if entries.is_empty() {
            return Ok(IndexResult {
                index: bucket_id.to_string(),
                status,
                documents: 0,
                item_errors: false,
                acknowledgement: Value::Null,
            });
        }

        let body = bulk_body(bucket_id, entries)?;
        let acknowledgement = self.engine.bulk(bucket_id, body).await?;

        let item_errors = acknowledgement
            .get("errors")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if item_errors {
            warn!(
                index = bucket_id,
                documents = entries.len(),
                "Bulk request accepted but some documents were rejected"
            );
        }

        Ok(IndexResult {
            index: bucket_id.to_string(),
            status,
            documents: entries.len(),
            item_errors,
            acknowledgement,
        })
    }

    /// Group entries by content date and publish each group to its own bucket,
    /// oldest date first. Stops at the first failing bucket.
    pub async fn publish_by_date(
        &self,
        entries: &[LogEntry],
    ) -> Result<Vec<IndexResult>, IndexError> {
        let mut buckets: BTreeMap<&str, Vec<LogEntry>> = BTreeMap::new();
        for entry in entries {
            buckets.entry(entry.date()).or_default().push(entry.clone());
        }

        let mut results = Vec::with_capacity(buckets.len());
        for (date, group) in buckets {
            let index = self.index_name(date);
            results.push(self.publish(&index, &group).await?);
        }
        Ok(results)
    }
}

/// Render the bulk-API body: an action line followed by the document line,
/// for every entry, newline terminated.
pub fn bulk_body(index: &str, entries: &[LogEntry]) -> Result<String, IndexError> {
    let action = json!({ "index": { "_index": index } }).to_string();
    let mut body = String::new();
    for entry in entries {
        let document = serde_json::to_string(entry).map_err(|source| IndexError::Encode {
            index: index.to_string(),
            source,
        })?;
        body.push_str(&action);
        body.push('\n');
        body.push_str(&document);
        body.push('\n');
    }
    Ok(body)
}
