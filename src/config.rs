use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    /// A local directory stands in for the bucket (development, tests).
    Local,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(AppError::Config(format!(
                "APP_STORAGE_BACKEND must be 's3' or 'local', got '{other}'"
            ))),
        }
    }
}

pub struct Settings {
    /// HTTP server port (`POST /log`, `GET /`, `GET /v1/health`)
    pub http_port: u16,
    /// Directory holding batch files until they are forwarded
    pub log_directory: PathBuf,
    pub file_prefix: String,

    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_root: Option<PathBuf>,

    pub es_scheme: String,
    pub es_host: String,
    pub es_port: u16,
    pub es_user: Option<String>,
    pub es_password: Option<String>,
    pub es_index_prefix: String,
    /// Existence query path; `{}` is replaced with the index name
    pub es_index_query_endpoint: String,
    pub es_accept_invalid_certs: bool,

    /// Applied to every object storage and search engine call
    pub upstream_timeout: Duration,
    pub jwt_secret: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("http_port", &self.http_port)
            .field("log_directory", &self.log_directory)
            .field("file_prefix", &self.file_prefix)
            .field("storage_backend", &self.storage_backend)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("local_storage_root", &self.local_storage_root)
            .field("es_scheme", &self.es_scheme)
            .field("es_host", &self.es_host)
            .field("es_port", &self.es_port)
            .field("es_user", &self.es_user)
            .field("es_password", &self.es_password.as_ref().map(|_| "[REDACTED]"))
            .field("es_index_prefix", &self.es_index_prefix)
            .field("es_index_query_endpoint", &self.es_index_query_endpoint)
            .field("es_accept_invalid_certs", &self.es_accept_invalid_certs)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

impl Settings {
    /// Build settings from any key lookup. `get_configuration` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings {
            http_port: parse_or(&lookup, "HTTP_PORT", 8080)?,
            log_directory: lookup("APP_LOG_DIRECTORY")
                .unwrap_or_else(|| "./logs".to_string())
                .into(),
            file_prefix: lookup("APP_FILE_PREFIX").unwrap_or_else(|| "logaggregator".to_string()),

            storage_backend: parse_or(&lookup, "APP_STORAGE_BACKEND", StorageBackend::S3)?,
            s3_bucket: required(&lookup, "APP_S3_BUCKET")?,
            s3_region: optional(&lookup, "APP_S3_REGION"),
            s3_endpoint: optional(&lookup, "APP_S3_ENDPOINT"),
            local_storage_root: optional(&lookup, "APP_LOCAL_STORAGE_ROOT").map(PathBuf::from),

            es_scheme: lookup("APP_ES_SCHEME").unwrap_or_else(|| "https".to_string()),
            es_host: required(&lookup, "APP_ES_HOST")?,
            es_port: parse_or(&lookup, "APP_ES_PORT", 9200)?,
            es_user: optional(&lookup, "APP_ES_USER"),
            es_password: optional_secret(&lookup, "APP_ES_PASSWORD")?,
            es_index_prefix: lookup("APP_ES_INDEX_PREFIX")
                .unwrap_or_else(|| "logaggregator".to_string()),
            es_index_query_endpoint: lookup("APP_ES_INDEX_QUERY_ENDPOINT")
                .unwrap_or_else(|| "/_cat/indices/{}".to_string()),
            es_accept_invalid_certs: parse_or(&lookup, "APP_ES_ACCEPT_INVALID_CERTS", false)?,

            upstream_timeout: Duration::from_secs(parse_or(
                &lookup,
                "APP_UPSTREAM_TIMEOUT_SECS",
                30u64,
            )?),
            jwt_secret: optional_secret(&lookup, "APP_JWT_SECRET")?.ok_or_else(|| {
                AppError::Config(
                    "Missing required environment variable: APP_JWT_SECRET or APP_JWT_SECRET_FILE"
                        .into(),
                )
            })?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_port(self.http_port)?;
        validate_port(self.es_port)?;
        validate_host(&self.es_host)?;

        if self.file_prefix.trim().is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(AppError::Config(
                "File prefix must be non-empty and contain no path separators".into(),
            ));
        }
        if self.s3_bucket.trim().is_empty() {
            return Err(AppError::Config("Bucket cannot be empty".into()));
        }
        if self.storage_backend == StorageBackend::Local && self.local_storage_root.is_none() {
            return Err(AppError::Config(
                "APP_LOCAL_STORAGE_ROOT is required when APP_STORAGE_BACKEND=local".into(),
            ));
        }
        if !matches!(self.es_scheme.as_str(), "http" | "https") {
            return Err(AppError::Config(format!(
                "Search engine scheme must be http or https, got '{}'",
                self.es_scheme
            )));
        }
        if !self.es_index_query_endpoint.contains("{}") {
            return Err(AppError::Config(
                "Index query endpoint must contain a '{}' placeholder".into(),
            ));
        }
        if self.upstream_timeout.is_zero() {
            return Err(AppError::Config("Upstream timeout cannot be 0".into()));
        }
        if self.jwt_secret.is_empty() {
            return Err(AppError::Config("JWT secret cannot be empty".into()));
        }
        Ok(())
    }
}

/// Validates that the host is not empty or whitespace-only.
fn validate_host(host: &str) -> Result<(), AppError> {
    if host.trim().is_empty() {
        return Err(AppError::Config("Host cannot be empty".into()));
    }
    Ok(())
}

/// Validates that the port is in valid range (1-65535).
fn validate_port(port: u16) -> Result<(), AppError> {
    if port == 0 {
        return Err(AppError::Config("Port cannot be 0".into()));
    }
    Ok(())
}

fn optional<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<String, AppError> {
    optional(lookup, key)
        .ok_or_else(|| AppError::Config(format!("Missing required environment variable: {key}")))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}

/// Read a value from `<key>_FILE` (Docker Secrets) first, then from `<key>` itself.
fn optional_secret<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
) -> Result<Option<String>, AppError> {
    let file_key = format!("{key}_FILE");
    if let Some(file_path) = optional(lookup, &file_key) {
        return fs::read_to_string(&file_path)
            .map(|content| Some(content.trim().to_string()))
            .map_err(|e| AppError::Config(format!("Failed to read {file_key}: {e}")));
    }
    Ok(lookup(key))
}

pub fn get_configuration() -> Result<Settings, AppError> {
    Settings::from_lookup(|key| env::var(key).ok())
}
