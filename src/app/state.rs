use crate::adapter::{ElasticsearchClient, ElasticsearchConfig, ObjectStoreForwarder};
use crate::auth::JwtVerifier;
use crate::config::{Settings, StorageBackend};
use crate::error::AppError;
use crate::pipeline::{BatchWriter, IndexPublisher, IngestionPipeline};
use crate::port::{SearchEngine, StorageForwarder};
use std::sync::Arc;

/// Shared application state: the ingestion pipeline and the token verifier.
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub verifier: Arc<JwtVerifier>,
}

impl AppState {
    /// Create `AppState` from configuration settings.
    ///
    /// Creates the batch directory, the object store client for the configured
    /// backend and the search engine client. Nothing is contacted over the network yet.
    pub async fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let writer = BatchWriter::new(&settings.log_directory, &settings.file_prefix)
            .await
            .map_err(|e| AppError::Init {
                component: "batch writer",
                message: e.to_string(),
            })?;

        let forwarder: Arc<dyn StorageForwarder> = match settings.storage_backend {
            StorageBackend::S3 => Arc::new(ObjectStoreForwarder::s3(
                &settings.s3_bucket,
                settings.s3_region.as_deref(),
                settings.s3_endpoint.as_deref(),
                settings.upstream_timeout,
            )?),
            StorageBackend::Local => {
                let root = settings.local_storage_root.as_deref().ok_or_else(|| {
                    AppError::Config("APP_LOCAL_STORAGE_ROOT is required for local storage".into())
                })?;
                Arc::new(ObjectStoreForwarder::local(
                    &settings.s3_bucket,
                    root,
                    settings.upstream_timeout,
                )?)
            }
        };

        let engine: Arc<dyn SearchEngine> = Arc::new(ElasticsearchClient::new(ElasticsearchConfig {
            scheme: settings.es_scheme.clone(),
            host: settings.es_host.clone(),
            port: settings.es_port,
            username: settings.es_user.clone(),
            password: settings.es_password.clone(),
            index_query_endpoint: settings.es_index_query_endpoint.clone(),
            accept_invalid_certs: settings.es_accept_invalid_certs,
            timeout: settings.upstream_timeout,
        })?);
        let publisher = IndexPublisher::new(engine, &settings.es_index_prefix);

        let pipeline = IngestionPipeline::new(writer, forwarder, publisher, &settings.s3_bucket);

        Ok(Self {
            pipeline: Arc::new(pipeline),
            verifier: Arc::new(JwtVerifier::hs256(&settings.jwt_secret)),
        })
    }
}
