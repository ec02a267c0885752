//! End-to-end tests of the signing identity against the mock device.
//!
//! Every test asserts the connection-release invariant on its way out: the
//! transport must be closed exactly once per acquisition, on success and on
//! every failure path.

use hardsign_codec::{Blob, CallRequest, Principal, QueryRequest, RequestContent};
use hardsign_device::testing::{ConnectFailure, MockDevice};
use hardsign_device::{DeviceError, Version, SIGNATURE_LENGTH};
use hardsign_identity::{encode_for_signing, LedgerIdentity};
use std::sync::Arc;

fn call_request(device: &MockDevice) -> CallRequest {
    CallRequest {
        canister_id: Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 42]).unwrap(),
        method_name: "icrc1_transfer".to_string(),
        arg: Blob(vec![0x44, 0x49, 0x44, 0x4c, 0x00, 0x00]),
        sender: Principal::from_text(&device.principal_text()).unwrap(),
        ingress_expiry: 1_700_000_000_000_000_000,
        nonce: None,
    }
}

fn query_request(device: &MockDevice) -> QueryRequest {
    QueryRequest {
        canister_id: Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 42]).unwrap(),
        method_name: "icrc1_balance_of".to_string(),
        arg: Blob(vec![0x44, 0x49, 0x44, 0x4c]),
        sender: Principal::from_text(&device.principal_text()).unwrap(),
        ingress_expiry: 1_700_000_000_000_000_000,
    }
}

fn assert_connections_released(device: &MockDevice) {
    assert_eq!(
        device.connect_count(),
        device.close_count(),
        "every acquired connection must be released"
    );
}

#[tokio::test]
async fn create_caches_the_device_key() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    assert_eq!(identity.public_key(), &device.public_key());
    assert_eq!(identity.sender().unwrap().to_text(), device.principal_text());
    assert_eq!(device.connect_count(), 1);
    assert_connections_released(&device);
}

#[tokio::test]
async fn create_fails_closed_on_inconsistent_device_identity() {
    let device = MockDevice::new();
    device.configure(|b| b.reported_principal = Some("2vxsx-fae".to_string()));

    let err = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap_err();
    assert!(matches!(err, DeviceError::IdentityMismatch { .. }));
    assert_connections_released(&device);
}

#[tokio::test]
async fn call_envelope_takes_the_dual_sign_path() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    let content = RequestContent::Call(call_request(&device));
    let envelope = identity.transform_request(content.clone()).await.unwrap();

    assert_eq!(envelope.sender_sig.as_slice().len(), SIGNATURE_LENGTH);
    assert_eq!(
        envelope.sender_pubkey.as_slice(),
        identity.public_key().to_der().unwrap()
    );
    assert_eq!(envelope.content, content);

    // The attached signature is the call signature: the mock signs
    // deterministically, so signing the same canonical bytes again must
    // reproduce it.
    let call_bytes = encode_for_signing(&content).unwrap();
    let read_state = RequestContent::ReadState(hardsign_identity::derive_read_state(
        match &content {
            RequestContent::Call(call) => call,
            _ => unreachable!(),
        },
    ));
    let read_state_bytes = encode_for_signing(&read_state).unwrap();
    let signatures = identity.sign_call(&call_bytes, &read_state_bytes).await.unwrap();
    assert_eq!(
        envelope.sender_sig.as_slice(),
        signatures.call_signature.as_bytes()
    );
    assert_ne!(
        signatures.call_signature.to_vec(),
        signatures.read_state_signature.to_vec()
    );

    // create + (version + sign) per transform/sign_call.
    assert_connections_released(&device);
}

#[tokio::test]
async fn query_envelope_takes_the_single_sign_path() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    let envelope = identity
        .transform_request(RequestContent::Query(query_request(&device)))
        .await
        .unwrap();

    assert_eq!(envelope.sender_sig.as_slice().len(), SIGNATURE_LENGTH);
    // create, version gate, sign: three scoped connections.
    assert_eq!(device.connect_count(), 3);
    assert_connections_released(&device);
}

#[tokio::test]
async fn deprecated_app_version_blocks_signing() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();
    device.configure(|b| b.app_version = Version::new(2, 4, 8));

    let err = identity
        .transform_request(RequestContent::Call(call_request(&device)))
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::DeprecatedApplication { .. }));
    assert_eq!(
        err.to_string(),
        "The app version 2.4.8 is deprecated (minimum supported: 2.4.9)."
    );
    assert_connections_released(&device);
}

#[tokio::test]
async fn user_rejection_surfaces_and_releases_the_connection() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();
    device.configure(|b| b.reject_signing = true);

    let err = identity
        .transform_request(RequestContent::Call(call_request(&device)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User rejected transaction.");
    assert_connections_released(&device);
}

#[tokio::test]
async fn missing_signature_reports_code_and_message() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();
    device.configure(|b| b.drop_signature = true);

    let err = identity.sign(b"canonical bytes").await.unwrap_err();
    assert_eq!(err.to_string(), "Signature not provided (28416): undefined");
    assert_connections_released(&device);
}

#[tokio::test]
async fn wrong_length_signature_is_rejected_on_both_paths() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();
    device.configure(|b| b.signature_length = Some(68));

    let err = identity.sign(b"canonical bytes").await.unwrap_err();
    assert_eq!(err.to_string(), "Signature has length 68 instead of 64.");

    let err = identity
        .transform_request(RequestContent::Call(call_request(&device)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Signature has length 68 instead of 64.");
    assert_connections_released(&device);
}

#[tokio::test]
async fn swapped_device_key_fails_closed() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    // Another key appears on the same path (device swapped mid-session).
    let other = hardsign_device::testing::secondary_key_sec1();
    device.configure(|b| b.reported_public_key = Some(other));

    let err = identity.sign(b"canonical bytes").await.unwrap_err();
    assert!(matches!(err, DeviceError::IdentityMismatch { .. }));
    assert_connections_released(&device);
}

#[tokio::test]
async fn connect_failures_propagate_distinctly() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    for (failure, expected) in [
        (ConnectFailure::Denied, "Connection failed. Access denied to the device."),
        (ConnectFailure::NoDevice, "Connection failed. No device found."),
        (ConnectFailure::Ambiguous, "Connection failed. Several devices detected."),
        (ConnectFailure::UnsupportedHost, "The host environment is not supported."),
    ] {
        device.configure(|b| b.fail_connect = Some(failure));
        let err = identity.sign(b"bytes").await.unwrap_err();
        assert_eq!(err.to_string(), expected);
    }
    assert_connections_released(&device);
}

#[tokio::test]
async fn show_address_returns_the_device_principal() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    let shown = identity.show_address_on_device().await.unwrap();
    assert_eq!(shown, device.principal_text());
    assert_connections_released(&device);
}

#[tokio::test]
async fn version_checks_the_device_key() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    let other = hardsign_device::testing::secondary_key_sec1();
    device.configure(|b| b.reported_public_key = Some(other));

    let err = identity.version().await.unwrap_err();
    assert!(matches!(err, DeviceError::IdentityMismatch { .. }));
    assert_connections_released(&device);
}

#[tokio::test]
async fn version_is_fetched_fresh_each_operation() {
    let device = MockDevice::new();
    let identity = LedgerIdentity::create(Arc::new(device.clone())).await.unwrap();

    assert_eq!(identity.version().await.unwrap(), Version::new(2, 4, 9));
    device.configure(|b| b.app_version = Version::new(3, 1, 0));
    assert_eq!(identity.version().await.unwrap(), Version::new(3, 1, 0));
    assert_connections_released(&device);
}
