//! Error types for duet-core.
//!
//! Every failure is local to one message or one subscription. Nothing in
//! this crate decides whether a failure is fatal for a whole delivery run;
//! that is the caller's policy.
//!
//! # Error Categories
//!
//! - **Encoding errors**: `Decode`, `Serialization`
//! - **Key errors**: `KeyFormat`
//! - **Signature errors**: `InvalidDer`
//! - **Message errors**: `PayloadTooLarge`, `InvalidEndpoint`
//! - **Primitive errors**: `Crypto`

/// Result type alias for duet-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during duet-core operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // ==================== Encoding Errors ====================
    /// Input is not valid base64url.
    #[error("invalid base64url: {0}")]
    Decode(String),

    /// JSON encoding of an assertion segment failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    // ==================== Key Errors ====================
    /// A key decoded to the wrong length, wrong prefix, or not a curve point.
    ///
    /// Always raised before any network call.
    #[error("malformed {key}: expected {expected}, got {actual}")]
    KeyFormat {
        /// Which key was rejected (`p256dh`, `auth secret`, ...).
        key: &'static str,
        /// What the key should have been.
        expected: &'static str,
        /// What was actually found.
        actual: String,
    },

    // ==================== Signature Errors ====================
    /// ASN.1 DER signature could not be parsed.
    #[error("invalid DER signature: {reason}")]
    InvalidDer {
        /// Description of what's wrong.
        reason: &'static str,
    },

    // ==================== Message Errors ====================
    /// Endpoint URL has no usable origin for the VAPID audience.
    #[error("invalid push endpoint: {reason}")]
    InvalidEndpoint {
        /// Description of what's wrong.
        reason: String,
    },

    /// Encrypted body would exceed what push services must accept.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Plaintext size in bytes.
        size: usize,
        /// Maximum plaintext size in bytes.
        max: usize,
    },

    // ==================== Primitive Errors ====================
    /// A cryptographic primitive refused its input.
    #[error("{operation} failed")]
    Crypto {
        /// Name of the failing operation.
        operation: &'static str,
    },
}

impl Error {
    /// Build a `KeyFormat` error for a length mismatch.
    pub(crate) fn key_length(key: &'static str, expected: &'static str, actual: usize) -> Self {
        Error::KeyFormat {
            key,
            expected,
            actual: format!("{actual} bytes"),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
