//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding requests or decoding identity material.
///
/// Unencodable input is a programming error and is surfaced loudly; fields
/// are never silently dropped.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Canonical CBOR serialization failed.
    #[error("CBOR encoding failed: {0}")]
    Cbor(String),

    /// The public key bytes are not a valid SEC1 secp256k1 point.
    #[error("invalid secp256k1 public key: {0}")]
    InvalidPublicKey(String),

    /// DER (SPKI) encoding of a public key failed.
    #[error("DER encoding failed: {0}")]
    Der(String),

    /// A principal was malformed (too long, bad text encoding, or bad
    /// checksum).
    #[error("invalid principal: {reason}")]
    InvalidPrincipal { reason: String },
}
