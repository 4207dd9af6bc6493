//! Message encryption for Web Push (RFC 8291 over RFC 8188 `aes128gcm`).
//!
//! # Body layout
//!
//! ```text
//! +-----------+---------+---------+---------------------+-------------------+
//! | salt (16) | rs (4)  | idlen=65| ephemeral key (65)  | ciphertext || tag |
//! +-----------+---------+---------+---------------------+-------------------+
//! ```
//!
//! A single record is always used: `rs` is the padded plaintext length plus
//! the 16-byte tag, and the only padding is the final-record delimiter.
//!
//! # Key schedule
//!
//! ```text
//! ecdh   = ECDH(ephemeral_private, ua_public)
//! ikm    = HKDF(salt=auth_secret, ikm=ecdh,
//!               info="WebPush: info\0" || ua_public || ephemeral_public, L=32)
//! cek    = HKDF(salt=salt, ikm=ikm, info="Content-Encoding: aes128gcm\0", L=16)
//! nonce  = HKDF(salt=salt, ikm=ikm, info="Content-Encoding: nonce\0", L=12)
//! ```
//!
//! A fresh ephemeral key and salt are drawn per call, so encrypting the
//! same payload twice never yields the same bytes.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::rand_core::{CryptoRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use sha2::Sha256;

use crate::codec;
use crate::error::{Error, Result};
use crate::keys::{RecipientKeys, PUBLIC_KEY_LEN};

/// Per-message random salt.
pub const SALT_LEN: usize = 16;
/// Big-endian record size field.
pub const RECORD_SIZE_LEN: usize = 4;
/// AES-GCM authentication tag.
pub const TAG_LEN: usize = 16;
/// Content-encryption key (AES-128).
pub const CEK_LEN: usize = 16;
/// AES-GCM nonce.
pub const NONCE_LEN: usize = 12;

/// `salt || rs || idlen || keyid`
pub const HEADER_LEN: usize = SALT_LEN + RECORD_SIZE_LEN + 1 + PUBLIC_KEY_LEN;

/// Largest body every push service is required to accept.
pub const MAX_BODY_LEN: usize = 4096;

/// Largest plaintext that still fits in [`MAX_BODY_LEN`].
pub const MAX_PLAINTEXT_LEN: usize = MAX_BODY_LEN - HEADER_LEN - TAG_LEN - 1;

/// Marks the last (and only) record.
pub(crate) const RECORD_DELIMITER: u8 = 0x02;

const IKM_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const IKM_LEN: usize = 32;

/// Encrypt `plaintext` for one subscription.
///
/// Fails with [`Error::PayloadTooLarge`] before doing any cryptography when
/// the body would exceed [`MAX_BODY_LEN`].
pub fn encrypt(
    plaintext: &[u8],
    keys: &RecipientKeys,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(Error::PayloadTooLarge {
            size: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let ephemeral = SecretKey::random(rng);

    encrypt_with(plaintext, keys, &ephemeral, &salt)
}

/// Encrypt with a given sender key and salt. Both must be fresh per message.
pub(crate) fn encrypt_with(
    plaintext: &[u8],
    keys: &RecipientKeys,
    ephemeral: &SecretKey,
    salt: &[u8; SALT_LEN],
) -> Result<Vec<u8>> {
    let recipient = keys.point()?;
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_affine());

    let (cek, nonce) = derive_content_keys(
        shared.raw_secret_bytes(),
        keys.auth_secret(),
        keys.public_key(),
        ephemeral_public.as_bytes(),
        salt,
    )?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1);
    padded.extend_from_slice(plaintext);
    padded.push(RECORD_DELIMITER);

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| Error::Crypto {
        operation: "AES-GCM key setup",
    })?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), padded.as_slice())
        .map_err(|_| Error::Crypto {
            operation: "AES-GCM encryption",
        })?;

    let record_size = (padded.len() + TAG_LEN) as u32;
    Ok(codec::concat(&[
        &salt[..],
        &record_size.to_be_bytes()[..],
        &[PUBLIC_KEY_LEN as u8][..],
        ephemeral_public.as_bytes(),
        &ciphertext[..],
    ]))
}

/// Derive the content-encryption key and nonce for one message.
fn derive_content_keys(
    shared_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; CEK_LEN], [u8; NONCE_LEN])> {
    let info = codec::concat(&[IKM_INFO, ua_public, as_public]);
    let mut ikm = [0u8; IKM_LEN];
    Hkdf::<Sha256>::new(Some(auth_secret), shared_secret)
        .expand(&info, &mut ikm)
        .map_err(|_| Error::Crypto {
            operation: "HKDF expand",
        })?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; CEK_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    prk.expand(CEK_INFO, &mut cek).map_err(|_| Error::Crypto {
        operation: "HKDF expand",
    })?;
    prk.expand(NONCE_INFO, &mut nonce).map_err(|_| Error::Crypto {
        operation: "HKDF expand",
    })?;

    Ok((cek, nonce))
}
