//! Bearer token check for the relay API.
//!
//! The relay sits behind the application, which authenticates end users
//! and asserts group membership. The relay itself only checks that the
//! caller knows the deployment's shared `API_TOKEN`.
//!
//! # Security Model
//!
//! - Only SHA-256(token) is held in memory after startup
//! - Comparison is over the hashes, so its timing does not depend on the token
//! - With no token configured every call is accepted
//! - `/health` and `/v1/push/public-key` are never checked

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ring::digest::{digest, SHA256};
use serde::Serialize;

/// Configured API token, stored as its hex SHA-256
#[derive(Clone, Default)]
pub struct ApiToken {
    hash: Option<String>,
}

impl ApiToken {
    /// `None` disables the check.
    pub fn new(token: Option<&str>) -> Self {
        Self {
            hash: token.map(hash_token),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.hash.is_some()
    }

    /// Check the request's `Authorization` header.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(expected) = &self.hash else {
            return Ok(());
        };

        let header_value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?;
        let token = extract_bearer_token(header_value).ok_or(AuthError::InvalidHeader)?;

        if hash_token(token) == *expected {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiToken")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Hash a token using SHA-256 and return hex-encoded result
pub fn hash_token(token: &str) -> String {
    let hash = digest(&SHA256, token.as_bytes());
    hex::encode(hash.as_ref())
}

/// Authorization error
#[derive(Debug)]
pub enum AuthError {
    /// Missing Authorization header
    MissingHeader,
    /// Invalid Authorization header format
    InvalidHeader,
    /// Token does not match
    Unauthorized,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTH",
                "Authorization header required",
            ),
            AuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "INVALID_AUTH",
                "Invalid Authorization header format",
            ),
            AuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid token")
            }
        };

        let body = Json(AuthErrorResponse {
            error: message.to_string(),
            code,
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix("Bearer ")
        .or_else(|| authorization.strip_prefix("bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn hash_token_works() {
        let hash = hash_token("relay-token");

        // 32 bytes SHA-256
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_token("relay-token"));
        assert_ne!(hash, hash_token("relay-token2"));
    }

    #[test]
    fn disabled_token_accepts_everything() {
        let token = ApiToken::new(None);
        assert!(!token.is_enabled());
        assert!(token.verify(&HeaderMap::new()).is_ok());
        assert!(token.verify(&bearer("Bearer anything")).is_ok());
    }

    #[test]
    fn enabled_token_checks_header() {
        let token = ApiToken::new(Some("s3cret"));
        assert!(token.is_enabled());

        assert!(token.verify(&bearer("Bearer s3cret")).is_ok());
        assert!(matches!(
            token.verify(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            token.verify(&bearer("Basic s3cret")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            token.verify(&bearer("Bearer wrong")),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn debug_hides_hash() {
        let token = ApiToken::new(Some("s3cret"));
        let debug = format!("{token:?}");
        assert!(!debug.contains(&hash_token("s3cret")));
        assert!(debug.contains("enabled: true"));
    }

    #[test]
    fn extract_bearer_token_works() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer ABC123"), Some("ABC123"));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("abc123"), None);
    }
}
