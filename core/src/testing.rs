//! Receiver-side helpers for tests: a browser stand-in.
//!
//! Only compiled with `cfg(test)` or the `test-utils` feature. Nothing in
//! production decrypts push messages; the receiving browser does that.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::{CryptoRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::Sha256;

use crate::codec;
use crate::ece::{HEADER_LEN, RECORD_DELIMITER, SALT_LEN, TAG_LEN};
use crate::error::{Error, Result};
use crate::keys::{RecipientKeys, AUTH_SECRET_LEN, PUBLIC_KEY_LEN};

/// A simulated browser subscription: private key plus the strings a real
/// browser would hand to the server.
#[derive(Clone)]
pub struct TestRecipient {
    pub secret: SecretKey,
    pub keys: RecipientKeys,
    pub p256dh: String,
    pub auth: String,
}

impl TestRecipient {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut auth = [0u8; AUTH_SECRET_LEN];
        rng.fill_bytes(&mut auth);
        let secret = SecretKey::random(rng);
        let public = secret.public_key().to_encoded_point(false);

        let p256dh = codec::encode(public.as_bytes());
        let auth_b64 = codec::encode(auth);
        let keys = RecipientKeys::from_base64url(&p256dh, &auth_b64)
            .unwrap_or_else(|e| panic!("generated keys rejected: {e}"));

        Self {
            secret,
            keys,
            p256dh,
            auth: auth_b64,
        }
    }

    pub fn decrypt(&self, body: &[u8]) -> Result<Vec<u8>> {
        decrypt(body, &self.secret, self.keys.auth_secret())
    }
}

/// Reference `aes128gcm` decoder for a single-record Web Push body.
pub fn decrypt(body: &[u8], secret: &SecretKey, auth_secret: &[u8]) -> Result<Vec<u8>> {
    if body.len() < HEADER_LEN + TAG_LEN + 1 {
        return Err(Error::Crypto {
            operation: "record parse",
        });
    }

    let salt = &body[..SALT_LEN];
    let rs = u32::from_be_bytes([body[16], body[17], body[18], body[19]]) as usize;
    let id_len = body[20] as usize;
    if id_len != PUBLIC_KEY_LEN {
        return Err(Error::Crypto {
            operation: "record parse",
        });
    }
    let sender_public = &body[21..HEADER_LEN];
    let record = &body[HEADER_LEN..];
    if record.len() > rs {
        return Err(Error::Crypto {
            operation: "record parse",
        });
    }

    let sender = PublicKey::from_sec1_bytes(sender_public).map_err(|_| Error::Crypto {
        operation: "sender key import",
    })?;
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), sender.as_affine());
    let ua_public = secret.public_key().to_encoded_point(false);

    // Receiver's own key schedule, written out from RFC 8291 §3.4 and RFC 8188 §2.2
    let hkdf_failed = |_| Error::Crypto {
        operation: "HKDF expand",
    };
    let mut key_info = b"WebPush: info\0".to_vec();
    key_info.extend_from_slice(ua_public.as_bytes());
    key_info.extend_from_slice(sender_public);
    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared.raw_secret_bytes())
        .expand(&key_info, &mut ikm)
        .map_err(hkdf_failed)?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(hkdf_failed)?;
    prk.expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(hkdf_failed)?;

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| Error::Crypto {
        operation: "AES-GCM key setup",
    })?;
    let mut padded = cipher
        .decrypt(Nonce::from_slice(&nonce), record)
        .map_err(|_| Error::Crypto {
            operation: "AES-GCM decryption",
        })?;

    // Strip trailing zero padding, then the delimiter
    while padded.last() == Some(&0) {
        padded.pop();
    }
    match padded.pop() {
        Some(RECORD_DELIMITER) => Ok(padded),
        _ => Err(Error::Crypto {
            operation: "padding check",
        }),
    }
}
