//! Per-request ingestion: parse, write, forward, clean up, publish.
//!
//! A request moves through `Received -> Parsed -> Written -> Forwarded ->
//! Cleaned -> Indexed`; any stage can end it with an error. The local batch
//! file is only deleted once the forwarder has reported success, and is kept
//! on disk for operator recovery when forwarding fails.

use crate::error::{ForwardFailure, IngestError};
use crate::parser;
use crate::pipeline::batch_writer::{BatchFile, BatchWriter};
use crate::pipeline::index_publisher::{IndexPublisher, IndexResult};
use crate::port::StorageForwarder;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    Written,
    Forwarded,
    Cleaned,
    Indexed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Parsed => "parsed",
            Stage::Written => "written",
            Stage::Forwarded => "forwarded",
            Stage::Cleaned => "cleaned",
            Stage::Indexed => "indexed",
        }
    }
}

/// What a successful ingestion did.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub origin: String,
    pub entries: usize,
    /// Batch file name, also the object name in storage. `None` for an empty payload.
    pub file: Option<String>,
    pub indexes: Vec<IndexResult>,
    pub stage: Stage,
}

pub struct IngestionPipeline {
    writer: BatchWriter,
    forwarder: Arc<dyn StorageForwarder>,
    publisher: IndexPublisher,
    bucket: String,
}

impl IngestionPipeline {
    pub fn new(
        writer: BatchWriter,
        forwarder: Arc<dyn StorageForwarder>,
        publisher: IndexPublisher,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            forwarder,
            publisher,
            bucket: bucket.into(),
        }
    }

    pub async fn ingest(
        &self,
        origin_ip: &str,
        payload: &[u8],
    ) -> Result<IngestReceipt, IngestError> {
        let entries =
            parser::parse(origin_ip, payload).map_err(|e| failed(Stage::Received, e.into()))?;

        if entries.is_empty() {
            info!(origin = origin_ip, "Payload contained no log lines");
            return Ok(IngestReceipt {
                origin: origin_ip.to_string(),
                entries: 0,
                file: None,
                indexes: Vec::new(),
                stage: Stage::Parsed,
            });
        }

        let file = self
            .writer
            .flush(&entries)
            .await
            .map_err(|e| failed(Stage::Parsed, e))?;

        let file = self.forward(file).await?;

        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            warn!(file = %file.path.display(), "Forwarded batch file could not be removed: {e}");
        }

        let indexes = self
            .publisher
            .publish_by_date(&entries)
            .await
            .map_err(|e| {
                error!(
                    object = %file.name,
                    bucket = %self.bucket,
                    "Batch is in storage but was not indexed"
                );
                failed(Stage::Cleaned, e.into())
            })?;

        info!(
            origin = origin_ip,
            entries = entries.len(),
            file = %file.name,
            indexes = indexes.len(),
            "Batch ingested"
        );

        Ok(IngestReceipt {
            origin: origin_ip.to_string(),
            entries: entries.len(),
            file: Some(file.name),
            indexes,
            stage: Stage::Indexed,
        })
    }

    /// Upload `file`, moving it to a fresh name whenever its object name is
    /// already taken in the bucket (another process or an earlier run).
    async fn forward(&self, mut file: BatchFile) -> Result<BatchFile, IngestError> {
        loop {
            match self
                .forwarder
                .upload(&file.path, &self.bucket, &file.name)
                .await
            {
                Ok(()) => return Ok(file),
                Err(e) if e.kind == ForwardFailure::AlreadyExists => {
                    info!(object = %file.name, bucket = %self.bucket, "Object name taken, renaming batch");
                    file = self
                        .writer
                        .relocate(&file)
                        .await
                        .map_err(|e| failed(Stage::Written, e))?;
                }
                Err(e) => {
                    warn!(file = %file.path.display(), "Batch file kept on disk for recovery");
                    return Err(failed(Stage::Written, e.into()));
                }
            }
        }
    }
}

fn failed(stage: Stage, err: IngestError) -> IngestError {
    let kind = err.kind();
    if kind.status().is_server_error() {
        error!(stage = stage.as_str(), kind = kind.as_str(), "Ingestion failed: {err}");
    } else {
        warn!(stage = stage.as_str(), kind = kind.as_str(), "Ingestion rejected: {err}");
    }
    err
}
