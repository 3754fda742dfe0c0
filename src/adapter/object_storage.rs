//! Batch file upload through the `object_store` crate (S3 or a local root).

use crate::error::{AppError, ForwardError, ForwardFailure};
use crate::port::StorageForwarder;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutMode, PutPayload};
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Uploads local batch files to one configured bucket.
pub struct ObjectStoreForwarder {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl ObjectStoreForwarder {
    pub fn new(bucket: impl Into<String>, store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self {
            bucket: bucket.into(),
            store,
            timeout,
        }
    }

    /// S3 bucket; credentials and region come from the standard `AWS_*` environment.
    pub fn s3(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_client_options(ClientOptions::new().with_timeout(timeout));

        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.build().map_err(|e| AppError::Init {
            component: "S3 object store",
            message: e.to_string(),
        })?;
        info!(bucket, "Using S3 object storage");
        Ok(Self::new(bucket, Arc::new(store), timeout))
    }

    /// Local directory standing in for a bucket; objects land at `<root>/<object_name>`.
    pub fn local(bucket: &str, root: &Path, timeout: Duration) -> Result<Self, AppError> {
        std::fs::create_dir_all(root).map_err(|e| AppError::Init {
            component: "local object store",
            message: format!("{}: {e}", root.display()),
        })?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|e| AppError::Init {
            component: "local object store",
            message: e.to_string(),
        })?;
        info!(bucket, root = %root.display(), "Using local object storage");
        Ok(Self::new(bucket, Arc::new(store), timeout))
    }

    fn failure(&self, kind: ForwardFailure, object: &str, message: impl Into<String>) -> ForwardError {
        ForwardError {
            kind,
            bucket: self.bucket.clone(),
            object: object.to_string(),
            message: message.into(),
        }
    }

    async fn put(&self, local_path: &Path, object_name: &str) -> Result<(), ForwardError> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            let kind = if e.kind() == ErrorKind::NotFound {
                ForwardFailure::NotFound
            } else {
                ForwardFailure::Unknown
            };
            self.failure(kind, object_name, format!("{}: {e}", local_path.display()))
        })?;

        let size = bytes.len();
        let location = ObjectPath::from(object_name);
        // Create-only: a name already in the bucket is reported, never replaced.
        let upload = self
            .store
            .put_opts(&location, PutPayload::from(bytes), PutMode::Create.into());

        match tokio::time::timeout(self.timeout, upload).await {
            Ok(Ok(_)) => {
                debug!(object = object_name, bucket = %self.bucket, size, "Uploaded batch file");
                Ok(())
            }
            Ok(Err(e)) => Err(self.failure(classify(&e), object_name, e.to_string())),
            Err(_) => Err(self.failure(
                ForwardFailure::Unreachable,
                object_name,
                format!("upload timed out after {:?}", self.timeout),
            )),
        }
    }
}

impl StorageForwarder for ObjectStoreForwarder {
    fn upload<'a>(
        &'a self,
        local_path: &'a Path,
        bucket: &'a str,
        object_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ForwardError>> + Send + 'a>> {
        Box::pin(async move {
            if bucket != self.bucket {
                return Err(self.failure(
                    ForwardFailure::Unknown,
                    object_name,
                    format!("no object store configured for bucket '{bucket}'"),
                ));
            }
            self.put(local_path, object_name).await
        })
    }
}

/// Map an object store error onto the forwarder's failure kinds.
pub fn classify(error: &object_store::Error) -> ForwardFailure {
    match error {
        object_store::Error::Unauthenticated { .. } | object_store::Error::PermissionDenied { .. } => {
            ForwardFailure::Unauthenticated
        }
        object_store::Error::AlreadyExists { .. } => ForwardFailure::AlreadyExists,
        object_store::Error::Generic { .. } => ForwardFailure::Unreachable,
        _ => ForwardFailure::Unknown,
    }
}
