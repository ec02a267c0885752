//! Representation-independent request hashing.
//!
//! A request id is a content hash over the request's fields, computed the
//! way the platform computes it: hash each field name and each encoded field
//! value with SHA-256, sort the `(key hash, value hash)` pairs by key hash,
//! concatenate, and hash the result. The device signs this id (under a
//! domain separator it applies itself), and the platform later recomputes it
//! from the submitted envelope, so any divergence here bricks the request.

use crate::request::{CallRequest, ReadStateRequest};
use sha2::{Digest, Sha256};
use std::fmt;

/// The 32-byte content hash identifying a request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// Request id of a call request.
    pub fn for_call(request: &CallRequest) -> Self {
        let mut fields = vec![
            ("request_type", Value::String("call")),
            ("canister_id", Value::Blob(request.canister_id.as_slice())),
            ("method_name", Value::String(&request.method_name)),
            ("arg", Value::Blob(request.arg.as_slice())),
            ("sender", Value::Blob(request.sender.as_slice())),
            ("ingress_expiry", Value::U64(request.ingress_expiry)),
        ];
        if let Some(nonce) = &request.nonce {
            fields.push(("nonce", Value::Blob(nonce.as_slice())));
        }
        Self(representation_independent_hash(&fields))
    }

    /// Request id of a read-state request.
    pub fn for_read_state(request: &ReadStateRequest) -> Self {
        let paths: Vec<Value<'_>> = request
            .paths
            .iter()
            .map(|path| Value::Array(path.iter().map(|label| Value::Blob(label.as_slice())).collect()))
            .collect();
        let fields = vec![
            ("request_type", Value::String("read_state")),
            ("paths", Value::Array(paths)),
            ("sender", Value::Blob(request.sender.as_slice())),
            ("ingress_expiry", Value::U64(request.ingress_expiry)),
        ];
        Self(representation_independent_hash(&fields))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for RequestId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A hashable field value. Mirrors the platform's value encoding rules:
/// blobs hash their raw bytes, strings their UTF-8 bytes, naturals their
/// unsigned LEB128 encoding, and arrays the concatenation of their element
/// hashes.
enum Value<'a> {
    Blob(&'a [u8]),
    String(&'a str),
    U64(u64),
    Array(Vec<Value<'a>>),
}

fn hash_value(value: &Value<'_>) -> [u8; 32] {
    match value {
        Value::Blob(bytes) => Sha256::digest(bytes).into(),
        Value::String(s) => Sha256::digest(s.as_bytes()).into(),
        Value::U64(n) => Sha256::digest(leb128_encode(*n)).into(),
        Value::Array(items) => {
            let mut hasher = Sha256::new();
            for item in items {
                hasher.update(hash_value(item));
            }
            hasher.finalize().into()
        }
    }
}

fn representation_independent_hash(fields: &[(&str, Value<'_>)]) -> [u8; 32] {
    let mut pairs: Vec<([u8; 32], [u8; 32])> = fields
        .iter()
        .map(|(key, value)| {
            let key_hash: [u8; 32] = Sha256::digest(key.as_bytes()).into();
            (key_hash, hash_value(value))
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (key_hash, value_hash) in pairs {
        hasher.update(key_hash);
        hasher.update(value_hash);
    }
    hasher.finalize().into()
}

fn leb128_encode(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
