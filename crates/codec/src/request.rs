//! Request data model.
//!
//! These are the structures that cross the signing boundary. Field order in
//! each struct is part of the canonical encoding: structs serialize in
//! declaration order and the model contains no maps, so identical logical
//! requests always produce identical bytes regardless of how callers built
//! them.

use crate::principal::Principal;
use serde::{Serialize, Serializer};

/// An opaque byte string serialized as a CBOR byte string (not an array of
/// integers, which is what a bare `Vec<u8>` would produce).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for Blob {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

/// A state-changing call to a canister.
///
/// The fields deterministically determine the request id; see
/// [`crate::hash::RequestId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    pub canister_id: Principal,
    pub method_name: String,
    pub arg: Blob,
    pub sender: Principal,
    /// Absolute expiry in nanoseconds since the Unix epoch.
    pub ingress_expiry: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Blob>,
}

/// A non-replicated query. Shares the call shape but never produces a
/// companion read-state request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub canister_id: Principal,
    pub method_name: String,
    pub arg: Blob,
    pub sender: Principal,
    pub ingress_expiry: u64,
}

/// A poll for the execution status of a previously submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadStateRequest {
    /// Each path is a sequence of labels into the platform state tree.
    pub paths: Vec<Vec<Blob>>,
    pub sender: Principal,
    pub ingress_expiry: u64,
}

/// The discriminated request entering the signing identity.
///
/// The `request_type` tag both classifies the request (call versus other)
/// and lands in the canonical encoding, so the signature commits to the
/// request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum RequestContent {
    Call(CallRequest),
    Query(QueryRequest),
    ReadState(ReadStateRequest),
}

impl RequestContent {
    /// True for the dual-sign path.
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call(_))
    }
}

/// The signed envelope handed back to the RPC agent for submission.
#[derive(Debug, Clone, Serialize)]
pub struct SignedEnvelope {
    pub content: RequestContent,
    /// DER (SPKI) encoding of the device public key.
    pub sender_pubkey: Blob,
    /// Signature over the canonical encoding of `content`. For calls this is
    /// the call signature; the read-state signature is consumed by the
    /// transport layer when polling and is never attached here.
    pub sender_sig: Blob,
}
