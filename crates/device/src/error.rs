//! Device error taxonomy.
//!
//! Every failure mode is a distinct variant, classified exactly once at the
//! boundary where it is observed (transport connect, response decode,
//! signature validation). Downstream code matches on variants, never on
//! message substrings. Each variant corresponds to a different user
//! remediation, which is why none of them may be collapsed into a generic
//! failure.

use crate::apdu::ReturnCode;
use crate::signature::SIGNATURE_LENGTH;
use crate::version::Version;
use hardsign_codec::CodecError;
use thiserror::Error;

/// Errors surfaced by device operations.
///
/// No automatic retry anywhere: retrying a hardware approval without fresh
/// user consent would be a security error, so every error propagates to the
/// caller and retry is a new user-initiated operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The user or the OS declined access to the device.
    #[error("Connection failed. Access denied to the device.")]
    ConnectionDenied,

    /// The host environment has no usable device transport.
    #[error("The host environment is not supported.")]
    UnsupportedHost,

    /// No candidate device was found.
    #[error("Connection failed. No device found.")]
    NoDevice,

    /// More than one candidate device was found; the target is ambiguous.
    #[error("Connection failed. Several devices detected.")]
    AmbiguousDevice,

    /// The device reported identity material inconsistent with itself or
    /// with the cached identity. Fail closed; never sign with a stale or
    /// substituted key.
    #[error("Identity mismatch: {reason}")]
    IdentityMismatch { reason: String },

    /// The device application is older than the minimum supported version.
    #[error("The app version {current} is deprecated (minimum supported: {minimum}).")]
    DeprecatedApplication { current: Version, minimum: Version },

    /// The user explicitly declined the operation on the device.
    #[error("User rejected transaction.")]
    UserRejected,

    /// The device reported success-adjacent status but returned no
    /// signature. Carries the raw return code and device message for
    /// diagnosis.
    #[error("Signature not provided ({return_code}): {message}")]
    SignatureMissing {
        return_code: ReturnCode,
        message: String,
    },

    /// The returned signature has the wrong length.
    #[error("Signature has length {actual} instead of {expected}.")]
    SignatureMalformed { actual: usize, expected: usize },

    /// A response that could not be parsed as the expected structure.
    #[error("Malformed device response: {reason}")]
    MalformedResponse { reason: String },

    /// A derivation path that could not be parsed or serialized.
    #[error("Invalid derivation path: {reason}")]
    InvalidDerivationPath { reason: String },

    /// There are no bytes to sign.
    #[error("Nothing to sign: empty payload.")]
    EmptyPayload,

    /// Canonical encoding or key decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Catch-all transport failure. The underlying message is preserved,
    /// never swallowed.
    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl DeviceError {
    /// Convenience constructor for malformed signature lengths.
    pub fn wrong_signature_length(actual: usize) -> Self {
        Self::SignatureMalformed {
            actual,
            expected: SIGNATURE_LENGTH,
        }
    }
}
