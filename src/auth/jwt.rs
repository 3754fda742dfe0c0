//! HS256 bearer token verification.

use crate::error::AuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by an ingestion token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    /// Permission set, e.g. `["log"]`.
    #[serde(default)]
    pub perm: Vec<String>,
}

impl Claims {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.perm.iter().any(|p| p == permission)
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn hs256(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_aud = false;
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::mint_token;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_valid_token_yields_claims() {
        let verifier = JwtVerifier::hs256(SECRET);
        let claims = verifier.verify(&mint_token(SECRET, &["log"], 300)).unwrap();
        assert!(claims.has_permission("log"));
        assert!(!claims.has_permission("admin"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);
        let err = verifier.verify(&mint_token(SECRET, &["log"], -300)).unwrap_err();
        assert_eq!(err, AuthError::ExpiredToken);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let verifier = JwtVerifier::hs256(SECRET);
        let err = verifier
            .verify(&mint_token("other-secret", &["log"], 300))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let verifier = JwtVerifier::hs256(SECRET);
        assert!(matches!(
            verifier.verify("not-a-token"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
