//! Canonical CBOR encoding of requests.
//!
//! The platform verifies the device signature against its own re-encoding of
//! the request, so the bytes produced here must match what the platform
//! recomputes byte for byte. The encoding is the request wrapped in a
//! `{ content: ... }` map under the self-described CBOR tag (55799).

use crate::error::CodecError;
use crate::request::RequestContent;
use serde::Serialize;

/// CBOR self-described tag, required by the platform's envelope format.
const SELF_DESCRIBED_CBOR: u64 = 55799;

#[derive(Serialize)]
struct SigningPayload<'a> {
    content: &'a RequestContent,
}

/// Encodes a request into the exact bytes that are hashed into the request
/// id, handed to the signing device, and later verified by the platform.
///
/// Deterministic by construction: struct fields serialize in declaration
/// order and the data model contains no maps.
pub fn encode_for_signing(content: &RequestContent) -> Result<Vec<u8>, CodecError> {
    let payload = SigningPayload { content };
    let tagged = ciborium::tag::Required::<_, { SELF_DESCRIBED_CBOR }>(payload);
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(&tagged, &mut buffer).map_err(|e| CodecError::Cbor(e.to_string()))?;
    Ok(buffer)
}
