//! Derivation of the read-state companion request.

use crate::hash::RequestId;
use crate::request::{Blob, CallRequest, ReadStateRequest};

/// State-tree label under which the platform publishes call statuses.
const REQUEST_STATUS_LABEL: &[u8] = b"request_status";

/// Derives the read-state request that polls for a call's execution status.
///
/// Pure and idempotent: the companion is fully determined by the call
/// request. Its only path is `("request_status", request_id)`, and `sender`
/// and `ingress_expiry` are copied verbatim so the platform accepts the poll
/// from the same identity within the same expiry window.
pub fn derive_read_state(call: &CallRequest) -> ReadStateRequest {
    let request_id = RequestId::for_call(call);
    ReadStateRequest {
        paths: vec![vec![
            Blob(REQUEST_STATUS_LABEL.to_vec()),
            Blob(request_id.as_bytes().to_vec()),
        ]],
        sender: call.sender.clone(),
        ingress_expiry: call.ingress_expiry,
    }
}
