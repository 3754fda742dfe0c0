use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Startup and server lifecycle failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load configuration: {0}")]
    Config(String),

    #[error("Failed to initialise {component}: {message}")]
    Init {
        component: &'static str,
        message: String,
    },

    #[error("Failed to bind to address {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// A structured field failed semantic validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} '{value}' is not a valid IPv4 address")]
    InvalidIpv4 { field: &'static str, value: String },

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
}

/// A payload could not be turned into log entries. Always names the 1-based line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("line {line}: expected at least {expected} '-' separated fields, found {found}")]
    MissingField {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: malformed {field} '{value}'")]
    Malformed {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: {source}")]
    Invalid {
        line: usize,
        #[source]
        source: ValidationError,
    },
}

impl ParseError {
    /// True when the line was well-formed but a field value was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, ParseError::Invalid { .. })
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::InvalidUtf8(_) => None,
            ParseError::MissingField { line, .. }
            | ParseError::Malformed { line, .. }
            | ParseError::Invalid { line, .. } => Some(*line),
        }
    }
}

/// Missing or unacceptable bearer credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing valid token")]
    MissingToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("missing authorization for requested resource: requires '{claim}'")]
    MissingClaim { claim: &'static str },
}

/// Why a single upload to object storage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardFailure {
    /// The local batch file disappeared before it could be read.
    NotFound,
    /// An object with this name is already stored; nothing was overwritten.
    AlreadyExists,
    Unauthenticated,
    Unreachable,
    Unknown,
}

impl fmt::Display for ForwardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ForwardFailure::NotFound => "not found",
            ForwardFailure::AlreadyExists => "already exists",
            ForwardFailure::Unauthenticated => "unauthenticated",
            ForwardFailure::Unreachable => "unreachable",
            ForwardFailure::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone)]
#[error("upload of '{object}' to bucket '{bucket}' failed ({kind}): {message}")]
pub struct ForwardError {
    pub kind: ForwardFailure,
    pub bucket: String,
    pub object: String,
    pub message: String,
}

/// The search engine refused or could not serve a request.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("search engine rejected {operation} for index '{index}' with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        index: String,
        status: u16,
        body: String,
    },

    #[error("search engine request {operation} for index '{index}' failed: {source}")]
    Transport {
        operation: &'static str,
        index: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to encode bulk body for index '{index}': {source}")]
    Encode {
        index: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unreadable {operation} response for index '{index}': {message}")]
    Decode {
        operation: &'static str,
        index: String,
        message: String,
    },
}

/// Caller-visible classification of an ingestion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Validation,
    Authorization,
    Io,
    Forward,
    Index,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Forward => "forward_error",
            ErrorKind::Index => "index_error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Parse | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
            ErrorKind::Io | ErrorKind::Forward | ErrorKind::Index => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Every way a `POST /log` call can end without success.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("Error writing batch file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Parse(e) if e.is_validation() => ErrorKind::Validation,
            IngestError::Parse(_) => ErrorKind::Parse,
            IngestError::Unauthorized(_) => ErrorKind::Authorization,
            IngestError::Io { .. } => ErrorKind::Io,
            IngestError::Forward(_) => ErrorKind::Forward,
            IngestError::Index(_) => ErrorKind::Index,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = Json(json!({
            "error": kind.as_str(),
            "message": self.to_string(),
        }));
        (kind.status(), body).into_response()
    }
}
