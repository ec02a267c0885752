//! In-process device double for tests and examples.
//!
//! [`MockDevice`] implements the transport traits over a deterministic
//! secp256k1 key and interprets the same APDU command set as the real
//! application: it accumulates payload chunks, produces genuine 64-byte
//! signatures, and reports its public key and principal text. Behavior
//! knobs inject every failure mode the error taxonomy names, so callers can
//! test each propagation path and count connection acquisitions/releases.

use crate::apdu::{self, ApduCommand, ApduResponse, ReturnCode, CLA};
use crate::error::DeviceError;
use crate::transport::{DeviceConnection, DeviceTransport};
use crate::version::{Version, MINIMUM_SUPPORTED_VERSION};
use async_trait::async_trait;
use hardsign_codec::DevicePublicKey;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Connect-time failures the mock can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    Denied,
    UnsupportedHost,
    NoDevice,
    Ambiguous,
}

/// Adjustable device behavior.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Application version the device reports.
    pub app_version: Version,
    /// Decline every signing request on-device.
    pub reject_signing: bool,
    /// Report an unknown error with no signature bytes.
    pub drop_signature: bool,
    /// Return junk signatures of this length instead of real ones.
    pub signature_length: Option<usize>,
    /// Claim this principal text instead of the one the key derives.
    pub reported_principal: Option<String>,
    /// Report these SEC1 bytes instead of the real public key.
    pub reported_public_key: Option<Vec<u8>>,
    /// Fail every connect attempt this way.
    pub fail_connect: Option<ConnectFailure>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            app_version: MINIMUM_SUPPORTED_VERSION,
            reject_signing: false,
            drop_signature: false,
            signature_length: None,
            reported_principal: None,
            reported_public_key: None,
            fail_connect: None,
        }
    }
}

struct MockState {
    signing_key: SigningKey,
    behavior: Mutex<MockBehavior>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// A scriptable in-process signing device.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<MockState>,
}

impl MockDevice {
    pub fn new() -> Self {
        // Any fixed scalar below the curve order works; determinism is the
        // point.
        let signing_key = SigningKey::from_slice(&[7u8; 32])
            .expect("static mock key is a valid secp256k1 scalar");
        Self {
            state: Arc::new(MockState {
                signing_key,
                behavior: Mutex::new(MockBehavior::default()),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    /// Adjusts device behavior for subsequent connections.
    pub fn configure(&self, adjust: impl FnOnce(&mut MockBehavior)) {
        let mut behavior = self
            .state
            .behavior
            .lock()
            .expect("mock behavior lock poisoned");
        adjust(&mut behavior);
    }

    /// Number of sessions opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions released so far. Equal to [`Self::connect_count`]
    /// whenever no operation is in flight.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// The device's real public key.
    pub fn public_key(&self) -> DevicePublicKey {
        let point = self.state.signing_key.verifying_key().to_encoded_point(false);
        DevicePublicKey::from_sec1(point.as_bytes())
            .expect("mock verifying key is a valid SEC1 point")
    }

    /// Principal text the real key derives.
    pub fn principal_text(&self) -> String {
        self.public_key()
            .principal()
            .expect("mock key DER-encodes")
            .to_text()
    }

    fn behavior(&self) -> MockBehavior {
        self.state
            .behavior
            .lock()
            .expect("mock behavior lock poisoned")
            .clone()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTransport for MockDevice {
    async fn connect(&self) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        if let Some(failure) = self.behavior().fail_connect {
            return Err(match failure {
                ConnectFailure::Denied => DeviceError::ConnectionDenied,
                ConnectFailure::UnsupportedHost => DeviceError::UnsupportedHost,
                ConnectFailure::NoDevice => DeviceError::NoDevice,
                ConnectFailure::Ambiguous => DeviceError::AmbiguousDevice,
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            device: self.clone(),
            buffer: Vec::new(),
        }))
    }
}

struct MockConnection {
    device: MockDevice,
    buffer: Vec<u8>,
}

impl MockConnection {
    fn sign_payload(&self, payload: &[u8]) -> Vec<u8> {
        let signature: EcdsaSignature = self.device.state.signing_key.sign(payload);
        signature.to_bytes().to_vec()
    }

    fn address_response(&self) -> ApduResponse {
        let behavior = self.device.behavior();
        let key_bytes = behavior
            .reported_public_key
            .unwrap_or_else(|| self.device.public_key().to_sec1_uncompressed());
        let principal_text = behavior.reported_principal.unwrap_or_else(|| {
            DevicePublicKey::from_sec1(&key_bytes)
                .ok()
                .and_then(|key| key.principal().ok())
                .map(|p| p.to_text())
                .unwrap_or_else(|| "aaaaa-aa".to_string())
        });

        let mut data = key_bytes;
        data.push(principal_text.len() as u8);
        data.extend_from_slice(principal_text.as_bytes());
        ApduResponse::new(data, ReturnCode::NoErrors)
    }

    fn finalize_sign(&self, ins: u8) -> ApduResponse {
        let behavior = self.device.behavior();
        if behavior.reject_signing {
            return ApduResponse::new(Vec::new(), ReturnCode::TransactionRejected);
        }
        if behavior.drop_signature {
            return ApduResponse::new(Vec::new(), ReturnCode::UnknownError);
        }

        match ins {
            apdu::ins::SIGN_SECP256K1 => {
                let data = match behavior.signature_length {
                    Some(len) => vec![0xab; len],
                    None => self.sign_payload(&self.buffer),
                };
                ApduResponse::new(data, ReturnCode::NoErrors)
            }
            apdu::ins::SIGN_UPDATE_CALL => match self.dual_response(behavior.signature_length) {
                Ok(response) => response,
                Err(reason) => {
                    ApduResponse::new(reason.into_bytes(), ReturnCode::DataInvalid)
                }
            },
            _ => ApduResponse::new(Vec::new(), ReturnCode::InsNotSupported),
        }
    }

    /// Parses the dual payload framing (u32 LE length before each blob) and
    /// signs both blobs independently.
    fn dual_response(&self, forced_length: Option<usize>) -> Result<ApduResponse, String> {
        let (call_blob, rest) = take_u32_prefixed(&self.buffer)?;
        let (read_blob, tail) = take_u32_prefixed(rest)?;
        if !tail.is_empty() {
            return Err("trailing bytes in dual payload".to_string());
        }

        let (call_sig, read_sig) = match forced_length {
            Some(len) => (vec![0xab; len], vec![0xcd; len]),
            None => (self.sign_payload(call_blob), self.sign_payload(read_blob)),
        };
        let mut data = Vec::with_capacity(2 + call_sig.len() + read_sig.len());
        data.push(call_sig.len() as u8);
        data.extend_from_slice(&call_sig);
        data.push(read_sig.len() as u8);
        data.extend_from_slice(&read_sig);
        Ok(ApduResponse::new(data, ReturnCode::NoErrors))
    }
}

/// SEC1 uncompressed bytes of a second fixed key, distinct from the one
/// [`MockDevice`] signs with. For device-swap scenarios.
pub fn secondary_key_sec1() -> Vec<u8> {
    let key = SigningKey::from_slice(&[9u8; 32])
        .expect("static secondary key is a valid secp256k1 scalar");
    key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
}

fn take_u32_prefixed(data: &[u8]) -> Result<(&[u8], &[u8]), String> {
    if data.len() < 4 {
        return Err("missing length prefix in dual payload".to_string());
    }
    let (len_bytes, rest) = data.split_at(4);
    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if rest.len() < len {
        return Err("truncated blob in dual payload".to_string());
    }
    Ok(rest.split_at(len))
}

#[async_trait]
impl DeviceConnection for MockConnection {
    async fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse, DeviceError> {
        if command.cla != CLA {
            return Ok(ApduResponse::new(Vec::new(), ReturnCode::ClaNotSupported));
        }
        let response = match command.ins {
            apdu::ins::GET_VERSION => {
                let version = self.device.behavior().app_version;
                ApduResponse::new(
                    vec![0, version.major, version.minor, version.patch, 0],
                    ReturnCode::NoErrors,
                )
            }
            apdu::ins::GET_ADDR_SECP256K1 => self.address_response(),
            apdu::ins::SIGN_SECP256K1 | apdu::ins::SIGN_UPDATE_CALL => match command.p1 {
                apdu::chunk::INIT => {
                    // Chunk zero carries the derivation path; a fresh
                    // signing session starts here.
                    self.buffer.clear();
                    ApduResponse::new(Vec::new(), ReturnCode::NoErrors)
                }
                apdu::chunk::ADD => {
                    self.buffer.extend_from_slice(&command.data);
                    ApduResponse::new(Vec::new(), ReturnCode::NoErrors)
                }
                apdu::chunk::LAST => {
                    self.buffer.extend_from_slice(&command.data);
                    self.finalize_sign(command.ins)
                }
                _ => ApduResponse::new(Vec::new(), ReturnCode::DataInvalid),
            },
            _ => ApduResponse::new(Vec::new(), ReturnCode::InsNotSupported),
        };
        Ok(response)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.device.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
