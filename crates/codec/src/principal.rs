//! Self-certifying principal identifiers.
//!
//! A principal is an opaque identifier of at most 29 bytes. The variant this
//! crate cares about is the *self-authenticating* principal: the SHA-224
//! digest of a DER-encoded public key followed by a `0x02` suffix byte, so
//! the identifier commits to the key that controls it.
//!
//! The textual form is the CRC-32 checksum of the raw bytes (big-endian)
//! prepended to the bytes, base32-encoded (RFC 4648 alphabet, lowercase, no
//! padding) and dash-grouped in chunks of five characters. The checksum lets
//! `from_text` reject typos instead of silently accepting a different
//! identity.

use crate::error::CodecError;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha224};
use std::fmt;

/// Maximum principal length in bytes.
pub const MAX_PRINCIPAL_LEN: usize = 29;

const SELF_AUTHENTICATING_SUFFIX: u8 = 0x02;
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// An opaque principal identifier (at most 29 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// Builds a principal from raw bytes, rejecting over-long input.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_PRINCIPAL_LEN {
            return Err(CodecError::InvalidPrincipal {
                reason: format!("{} bytes exceeds the {MAX_PRINCIPAL_LEN}-byte limit", bytes.len()),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Derives the self-authenticating principal for a DER-encoded public key.
    pub fn self_authenticating(public_key_der: &[u8]) -> Self {
        let digest = Sha224::digest(public_key_der);
        let mut bytes = digest.to_vec();
        bytes.push(SELF_AUTHENTICATING_SUFFIX);
        Self(bytes)
    }

    /// Raw principal bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Canonical textual form: checksummed, base32-encoded, dash-grouped.
    pub fn to_text(&self) -> String {
        let checksum = crc32fast::hash(&self.0);
        let mut data = checksum.to_be_bytes().to_vec();
        data.extend_from_slice(&self.0);
        let encoded = base32_encode(&data);

        let mut out = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                out.push('-');
            }
            out.push(c);
        }
        out
    }

    /// Parses the textual form, validating the checksum.
    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let data = base32_decode(&compact)?;
        if data.len() < 4 {
            return Err(CodecError::InvalidPrincipal {
                reason: "text too short to contain a checksum".to_string(),
            });
        }
        let (checksum_bytes, body) = data.split_at(4);
        let expected = u32::from_be_bytes([
            checksum_bytes[0],
            checksum_bytes[1],
            checksum_bytes[2],
            checksum_bytes[3],
        ]);
        if crc32fast::hash(body) != expected {
            return Err(CodecError::InvalidPrincipal {
                reason: "checksum mismatch".to_string(),
            });
        }
        Self::from_slice(body)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in data {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((acc >> bits) & 0x1f) as usize;
            out.push(BASE32_ALPHABET[index] as char);
        }
    }
    if bits > 0 {
        let index = ((acc << (5 - bits)) & 0x1f) as usize;
        out.push(BASE32_ALPHABET[index] as char);
    }
    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for c in text.chars() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a as char == c.to_ascii_lowercase())
            .ok_or_else(|| CodecError::InvalidPrincipal {
                reason: format!("invalid base32 character {c:?}"),
            })?;
        acc = (acc << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}
