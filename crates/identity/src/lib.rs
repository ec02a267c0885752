//! Hardware-backed signing identity.
//!
//! This crate is the public face of the hardsign stack: a
//! [`LedgerIdentity`] intercepts outgoing request envelopes, classifies
//! them (call versus other), canonicalizes them, drives the signing device
//! through the protocol client, validates everything the device returns,
//! and reassembles a signed envelope for the RPC agent to submit.
//!
//! # Security Model
//!
//! - The private key never exists on the host; every signature is produced
//!   on a physically separate device under explicit user approval.
//! - The public key is fetched once at identity creation and re-verified
//!   against the device on every subsequent operation; any mismatch fails
//!   closed.
//! - Every byte string is canonicalized before it leaves the process, and
//!   every signature is validated before it is trusted.
//! - Nothing retries automatically: a hardware approval is user consent,
//!   and consent is not replayed.

pub mod identity;
pub mod logging;

pub use hardsign_codec::{
    derive_read_state, encode_for_signing, Blob, CallRequest, CodecError, DevicePublicKey,
    Principal, QueryRequest, ReadStateRequest, RequestContent, RequestId, SignedEnvelope,
};
pub use hardsign_device::{
    DerivationPath, DeviceError, DeviceTransport, RequestSignatures, Signature, Version,
    DEFAULT_DERIVE_PATH,
};
pub use identity::LedgerIdentity;
