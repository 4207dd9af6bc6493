//! URL-safe base64 without padding.
//!
//! Every key, JWT segment and signature on the Web Push wire uses this
//! alphabet. Decoding accepts input with or without trailing `=` because
//! browsers and key generators disagree about padding; encoding never
//! emits it.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::Result;

const CONFIG: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// base64url engine: `-`/`_` alphabet, no padding on encode, optional on decode.
pub const BASE64URL: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, CONFIG);

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

/// Decode base64url, with or without padding.
///
/// Characters from the standard alphabet (`+`, `/`) are rejected.
pub fn decode(input: &str) -> Result<Vec<u8>> {
    Ok(BASE64URL.decode(input)?)
}

/// Concatenate byte slices into one buffer.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let total = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn encode_never_emits_standard_or_padding_chars() {
        // 0xfb 0xff produces '+' and '/' in the standard alphabet
        let bytes = [0xfbu8, 0xff, 0xbf, 0xfe];
        let encoded = encode(bytes);
        assert_eq!(encoded, "-_-__g");
        assert!(!encoded.contains(['+', '/', '=']));
    }

    #[test]
    fn decode_is_inverse_of_encode() {
        for len in 0..=70usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes, "length {}", len);
        }
    }

    #[test]
    fn decode_accepts_padding() {
        assert_eq!(decode("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode("AQI=").unwrap(), vec![1, 2]);
        assert_eq!(decode("AQ==").unwrap(), vec![1]);
    }

    #[test]
    fn decode_rejects_standard_alphabet() {
        assert!(matches!(decode("+/8"), Err(Error::Decode(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("not valid!").is_err());
        assert!(decode("A").is_err());
    }

    #[test]
    fn concat_joins_in_order() {
        assert_eq!(concat(&[&b"ab"[..], &b""[..], &b"c"[..]]), b"abc".to_vec());
        assert!(concat(&[]).is_empty());
    }
}
