//! Bearer token authorization for HTTP operations.
//!
//! Every route names its [`Operation`]; [`required_claims`] is the single place
//! that decides which `perm` entries an operation needs.

mod jwt;

pub use jwt::{Claims, JwtVerifier};

use crate::error::{AuthError, IngestError};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Online,
    Health,
    IngestLog,
}

pub fn required_claims(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::Online | Operation::Health => &[],
        Operation::IngestLog => &["log"],
    }
}

/// Middleware state: the verifier plus the operation the guarded route performs.
#[derive(Debug, Clone)]
pub struct ClaimGate {
    verifier: Arc<JwtVerifier>,
    operation: Operation,
}

impl ClaimGate {
    pub fn new(verifier: Arc<JwtVerifier>, operation: Operation) -> Self {
        Self {
            verifier,
            operation,
        }
    }

    /// Check `headers` against the operation's required claims.
    pub fn check(&self, headers: &HeaderMap) -> Result<Option<Claims>, AuthError> {
        let required = required_claims(self.operation);
        if required.is_empty() {
            return Ok(None);
        }

        let claims = self.verifier.verify(bearer_token(headers)?)?;
        if let Some(missing) = required.iter().find(|claim| !claims.has_permission(claim)) {
            return Err(AuthError::MissingClaim { claim: *missing });
        }
        Ok(Some(claims))
    }
}

/// Use with `axum::middleware::from_fn_with_state(gate, authorize)`.
pub async fn authorize(
    State(gate): State<ClaimGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, IngestError> {
    match gate.check(request.headers()) {
        Ok(Some(claims)) => {
            request.extensions_mut().insert(claims);
        }
        Ok(None) => {}
        Err(e) => {
            warn!(operation = ?gate.operation, path = %request.uri().path(), "Unauthorized request: {e}");
            return Err(e.into());
        }
    }
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
