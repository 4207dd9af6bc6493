//! Duet Core - Web Push message encryption and VAPID signing.
//!
//! This library provides the protocol half of push delivery:
//! - base64url key codec
//! - recipient key validation
//! - RFC 8291 `aes128gcm` message encryption
//! - RFC 8292 VAPID assertions, including DER to raw signature conversion
//!
//! # Constraints
//!
//! This library intentionally does NOT:
//! - Access the network
//! - Read the clock (callers pass `now` as unix seconds)
//! - Access OS randomness (callers pass an `RngCore + CryptoRng`)
//! - Store data persistently
//! - Log key material
//!
//! # Example
//!
//! ```
//! use duet_core::{ece, vapid, RecipientKeys, VapidIdentity};
//! use p256::elliptic_curve::rand_core::OsRng;
//! # use p256::elliptic_curve::sec1::ToEncodedPoint;
//! # let browser = p256::SecretKey::random(&mut OsRng);
//! # let p256dh = duet_core::codec::encode(browser.public_key().to_encoded_point(false).as_bytes());
//! # let auth = duet_core::codec::encode([7u8; 16]);
//!
//! let identity = VapidIdentity::generate(&mut OsRng, "mailto:ops@example.com").unwrap();
//!
//! // One subscription, as registered by a browser
//! let endpoint = "https://push.example.net/send/abc123";
//! let keys = RecipientKeys::from_base64url(&p256dh, &auth).unwrap();
//!
//! let body = ece::encrypt(br#"{"title":"hi"}"#, &keys, &mut OsRng).unwrap();
//! let audience = vapid::audience(endpoint).unwrap();
//! let authorization = identity.authorization(&audience, 1_760_000_000).unwrap();
//!
//! assert!(authorization.starts_with("vapid t="));
//! assert!(body.len() > ece::HEADER_LEN);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod der;
pub mod ece;
pub mod error;
pub mod keys;
pub mod vapid;

// Receiver-side reference decoder, never linked into production builds
#[cfg(any(test, feature = "test-utils"))]
#[allow(missing_docs)]
pub mod testing;

// Re-export main types at crate root
pub use der::der_to_raw_signature;
pub use ece::{encrypt, MAX_PLAINTEXT_LEN};
pub use error::{Error, Result};
pub use keys::RecipientKeys;
pub use vapid::{audience, VapidIdentity};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRecipient;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::Signature;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn full_delivery_preparation_roundtrip() {
        let mut rng = StdRng::seed_from_u64(1);

        // === Deployment identity ===
        let identity = VapidIdentity::generate(&mut rng, "mailto:ops@example.com").unwrap();

        // === Browser registers ===
        let browser = TestRecipient::generate(&mut rng);
        let endpoint = "https://fcm.googleapis.com/fcm/send/dGVzdA:APA91b";
        let keys = RecipientKeys::from_base64url(&browser.p256dh, &browser.auth).unwrap();

        // === Server prepares one delivery ===
        let payload = br#"{"title":"A","body":"hi","url":"/chat","tag":"chat"}"#;
        let body = encrypt(payload, &keys, &mut rng).unwrap();
        let aud = audience(endpoint).unwrap();
        let header = identity.authorization(&aud, 1_760_000_000).unwrap();

        // === Push service checks the assertion ===
        let token = header
            .strip_prefix("vapid t=")
            .and_then(|rest| rest.split(", k=").next())
            .unwrap();
        let (input, sig) = token.rsplit_once('.').unwrap();
        let sig = Signature::from_slice(&codec::decode(sig).unwrap()).unwrap();
        assert!(identity.verifying_key().verify(input.as_bytes(), &sig).is_ok());

        // === Browser decrypts ===
        assert_eq!(browser.decrypt(&body).unwrap(), payload);
    }

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
