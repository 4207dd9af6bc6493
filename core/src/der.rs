//! ASN.1 DER to raw `r || s` ECDSA signature conversion.
//!
//! Signing backends hand back ECDSA signatures as DER:
//!
//! ```text
//! 0x30 len 0x02 rlen r... 0x02 slen s...
//! ```
//!
//! JWS ES256 needs the fixed 64-byte form instead. DER integers are
//! minimal and signed, so each component can be:
//!
//! - **shorter than 32 bytes**: leading zero bytes were stripped; left-pad.
//! - **33 bytes**: a `0x00` was prepended because the top bit was set; drop it.

use crate::error::{Error, Result};

/// Width of one P-256 signature component.
pub const COMPONENT_SIZE: usize = 32;

/// Raw signature size (`r || s`).
pub const RAW_SIGNATURE_SIZE: usize = COMPONENT_SIZE * 2;

const SEQUENCE_TAG: u8 = 0x30;
const INTEGER_TAG: u8 = 0x02;

/// Convert a DER ECDSA signature into the fixed-width `r || s` form.
pub fn der_to_raw_signature(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_SIZE]> {
    let mut reader = DerReader { bytes: der, pos: 0 };

    if reader.byte()? != SEQUENCE_TAG {
        return Err(Error::InvalidDer {
            reason: "expected SEQUENCE",
        });
    }
    let body_len = reader.length()?;
    if reader.remaining() != body_len {
        return Err(Error::InvalidDer {
            reason: "SEQUENCE length does not match input",
        });
    }

    let mut raw = [0u8; RAW_SIGNATURE_SIZE];
    let r = reader.integer()?;
    write_component(r, &mut raw[..COMPONENT_SIZE])?;
    let s = reader.integer()?;
    write_component(s, &mut raw[COMPONENT_SIZE..])?;

    if reader.remaining() != 0 {
        return Err(Error::InvalidDer {
            reason: "trailing bytes after signature",
        });
    }

    Ok(raw)
}

/// Right-align one DER integer into a 32-byte slot.
fn write_component(value: &[u8], slot: &mut [u8]) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidDer {
            reason: "empty INTEGER",
        });
    }

    let value = if value.len() > COMPONENT_SIZE {
        let (extra, rest) = value.split_at(value.len() - COMPONENT_SIZE);
        if extra.iter().any(|&b| b != 0) {
            return Err(Error::InvalidDer {
                reason: "INTEGER wider than 32 bytes",
            });
        }
        rest
    } else {
        value
    };

    let offset = slot.len() - value.len();
    slot[..offset].fill(0);
    slot[offset..].copy_from_slice(value);
    Ok(())
}

struct DerReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.bytes.get(self.pos).ok_or(Error::InvalidDer {
            reason: "truncated",
        })?;
        self.pos += 1;
        Ok(b)
    }

    /// Short form, or long form with a single length byte (`0x81 nn`).
    fn length(&mut self) -> Result<usize> {
        match self.byte()? {
            len @ 0x00..=0x7f => Ok(len as usize),
            0x81 => {
                let len = self.byte()?;
                if len < 0x80 {
                    return Err(Error::InvalidDer {
                        reason: "non-minimal length",
                    });
                }
                Ok(len as usize)
            }
            _ => Err(Error::InvalidDer {
                reason: "unsupported length encoding",
            }),
        }
    }

    fn integer(&mut self) -> Result<&'a [u8]> {
        if self.byte()? != INTEGER_TAG {
            return Err(Error::InvalidDer {
                reason: "expected INTEGER",
            });
        }
        let len = self.length()?;
        if len > self.remaining() {
            return Err(Error::InvalidDer {
                reason: "INTEGER exceeds input",
            });
        }
        let value = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(value)
    }
}
