//! Browser subscription key material.
//!
//! A subscription carries two base64url strings: `p256dh`, the browser's
//! uncompressed P-256 public key, and `auth`, a 16-byte shared secret.
//! Both are validated here so a malformed subscription fails before any
//! cryptography or network work is attempted.

use p256::PublicKey;

use crate::codec;
use crate::error::{Error, Result};

/// Uncompressed SEC1 P-256 point length (`0x04 || X || Y`).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Subscription auth secret length.
pub const AUTH_SECRET_LEN: usize = 16;

/// Validated recipient keys for one subscription.
#[derive(Clone, PartialEq, Eq)]
pub struct RecipientKeys {
    public: [u8; PUBLIC_KEY_LEN],
    auth: [u8; AUTH_SECRET_LEN],
}

impl RecipientKeys {
    /// Decode and validate a subscription's `p256dh` and `auth` strings.
    pub fn from_base64url(p256dh: &str, auth: &str) -> Result<Self> {
        let public = codec::decode(p256dh)?;
        let auth = codec::decode(auth)?;
        Self::from_bytes(&public, &auth)
    }

    /// Validate raw key bytes.
    pub fn from_bytes(public: &[u8], auth: &[u8]) -> Result<Self> {
        let public: [u8; PUBLIC_KEY_LEN] = public
            .try_into()
            .map_err(|_| Error::key_length("p256dh", "65 bytes", public.len()))?;
        if public[0] != 0x04 {
            return Err(Error::KeyFormat {
                key: "p256dh",
                expected: "uncompressed point (0x04 prefix)",
                actual: format!("prefix 0x{:02x}", public[0]),
            });
        }
        PublicKey::from_sec1_bytes(&public).map_err(|_| Error::KeyFormat {
            key: "p256dh",
            expected: "point on P-256",
            actual: "off-curve point".to_string(),
        })?;

        let auth: [u8; AUTH_SECRET_LEN] = auth
            .try_into()
            .map_err(|_| Error::key_length("auth secret", "16 bytes", auth.len()))?;

        Ok(Self { public, auth })
    }

    /// The browser's public key, uncompressed.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    /// The subscription auth secret.
    pub fn auth_secret(&self) -> &[u8; AUTH_SECRET_LEN] {
        &self.auth
    }

    pub(crate) fn point(&self) -> Result<PublicKey> {
        PublicKey::from_sec1_bytes(&self.public).map_err(|_| Error::Crypto {
            operation: "recipient key import",
        })
    }
}

// Keep the auth secret out of logs.
impl std::fmt::Debug for RecipientKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientKeys")
            .field("public", &codec::encode(self.public))
            .field("auth", &"<redacted>")
            .finish()
    }
}
