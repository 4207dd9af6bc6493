//! VAPID sender identity and ES256 assertions (RFC 8292).
//!
//! One [`VapidIdentity`] exists per deployment. For every delivery it signs
//! a short-lived JWT whose audience is the push service's origin and
//! attaches its own public key, so the push service can check the
//! signature without any prior registration.
//!
//! ```text
//! Authorization: vapid t=<header>.<claims>.<r||s>, k=<public key>
//! ```

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::{CryptoRng, RngCore};
use serde::Serialize;
use url::{Host, Url};

use crate::codec;
use crate::der::der_to_raw_signature;
use crate::error::{Error, Result};
use crate::keys::PUBLIC_KEY_LEN;

/// Lifetime of each assertion.
pub const TOKEN_LIFETIME_SECS: u64 = 12 * 60 * 60;

/// Push services reject assertions valid for longer than this.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;

/// Raw P-256 private scalar length.
pub const PRIVATE_KEY_LEN: usize = 32;

const _: () = assert!(TOKEN_LIFETIME_SECS <= MAX_TOKEN_LIFETIME_SECS);

#[derive(Serialize)]
struct Header {
    typ: &'static str,
    alg: &'static str,
}

const HEADER: Header = Header {
    typ: "JWT",
    alg: "ES256",
};

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    iat: u64,
    exp: u64,
    sub: &'a str,
}

/// The deployment's signing key pair and contact URI.
#[derive(Clone)]
pub struct VapidIdentity {
    signing_key: SigningKey,
    public_key: [u8; PUBLIC_KEY_LEN],
    subject: String,
}

impl VapidIdentity {
    /// Load an identity from base64url key material.
    ///
    /// When `public_key` is given it must equal the point derived from
    /// `private_key`; a mismatched pair would produce assertions that no
    /// push service accepts.
    pub fn from_base64url(
        private_key: &str,
        public_key: Option<&str>,
        subject: impl Into<String>,
    ) -> Result<Self> {
        let identity = Self::from_private_key(&codec::decode(private_key)?, subject)?;

        if let Some(public_key) = public_key {
            let claimed = codec::decode(public_key)?;
            if claimed.len() != PUBLIC_KEY_LEN {
                return Err(Error::key_length(
                    "VAPID public key",
                    "65 bytes",
                    claimed.len(),
                ));
            }
            if claimed[..] != identity.public_key[..] {
                return Err(Error::KeyFormat {
                    key: "VAPID public key",
                    expected: "point derived from the private key",
                    actual: "a different point".to_string(),
                });
            }
        }

        Ok(identity)
    }

    /// Build an identity from a raw 32-byte private scalar.
    pub fn from_private_key(private_key: &[u8], subject: impl Into<String>) -> Result<Self> {
        if private_key.len() != PRIVATE_KEY_LEN {
            return Err(Error::key_length(
                "VAPID private key",
                "32 bytes",
                private_key.len(),
            ));
        }
        let signing_key = SigningKey::from_slice(private_key).map_err(|_| Error::KeyFormat {
            key: "VAPID private key",
            expected: "scalar in [1, n)",
            actual: "out of range".to_string(),
        })?;
        Self::from_signing_key(signing_key, subject.into())
    }

    /// Generate a fresh identity.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng), subject: impl Into<String>) -> Result<Self> {
        Self::from_signing_key(SigningKey::random(rng), subject.into())
    }

    fn from_signing_key(signing_key: SigningKey, subject: String) -> Result<Self> {
        let point = signing_key.verifying_key().to_encoded_point(false);
        let public_key = point.as_bytes().try_into().map_err(|_| Error::Crypto {
            operation: "public key derivation",
        })?;
        Ok(Self {
            signing_key,
            public_key,
            subject,
        })
    }

    /// Uncompressed public point.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// Public key as handed to browsers (`applicationServerKey`) and sent in `k=`.
    pub fn public_key_base64url(&self) -> String {
        codec::encode(self.public_key)
    }

    /// Private scalar, base64url. Only for writing new key material out.
    pub fn private_key_base64url(&self) -> String {
        codec::encode(self.signing_key.to_bytes())
    }

    /// Key push services verify assertions with.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Contact URI sent as `sub`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sign an assertion for `audience`, issued at `now` (unix seconds).
    pub fn sign(&self, audience: &str, now: u64) -> Result<String> {
        let claims = Claims {
            aud: audience,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
            sub: &self.subject,
        };

        let header = codec::encode(serde_json::to_vec(&HEADER)?);
        let claims = codec::encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{claims}");

        let der: DerSignature =
            self.signing_key
                .try_sign(signing_input.as_bytes())
                .map_err(|_| Error::Crypto {
                    operation: "ES256 signing",
                })?;
        let raw = der_to_raw_signature(der.as_bytes())?;

        Ok(format!("{signing_input}.{}", codec::encode(raw)))
    }

    /// Complete `Authorization` header value for one delivery.
    pub fn authorization(&self, audience: &str, now: u64) -> Result<String> {
        let token = self.sign(audience, now)?;
        Ok(format!("vapid t={token}, k={}", self.public_key_base64url()))
    }
}

impl std::fmt::Debug for VapidIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidIdentity")
            .field("public_key", &self.public_key_base64url())
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// The origin of a push endpoint, used as the assertion audience.
///
/// Non-default ports are kept and IPv6 hosts are bracketed.
pub fn audience(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint {
        reason: e.to_string(),
    })?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => format!("[{ip}]"),
        None => {
            return Err(Error::InvalidEndpoint {
                reason: "missing host".to_string(),
            })
        }
    };

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
