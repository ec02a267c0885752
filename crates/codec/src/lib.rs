//! Canonical request encoding for the hardsign signing stack.
//!
//! This crate owns everything that must be byte-exact before it reaches the
//! signing device or the network: the request data model, the canonical CBOR
//! encoding that is both hashed and signed, the representation-independent
//! request-id hash, self-authenticating principals, and the derivation of a
//! read-state companion request from a call request.
//!
//! Everything here is pure and synchronous. The device and identity crates
//! build on top of it; nothing in this crate talks to hardware or the
//! network.

pub mod cbor;
pub mod error;
pub mod hash;
pub mod key;
pub mod principal;
pub mod read_state;
pub mod request;

pub use cbor::encode_for_signing;
pub use error::CodecError;
pub use hash::RequestId;
pub use key::DevicePublicKey;
pub use principal::Principal;
pub use read_state::derive_read_state;
pub use request::{
    Blob, CallRequest, QueryRequest, ReadStateRequest, RequestContent, SignedEnvelope,
};
