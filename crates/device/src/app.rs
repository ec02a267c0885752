//! Device application protocol client.
//!
//! Drives the signing app's command set over an already-open connection.
//! The caller owns the connection's lifecycle; this client only exchanges
//! APDUs on it, so scoping (acquire before use, release on every exit path)
//! stays in one place in the identity layer.

use crate::apdu::{self, ApduCommand, ApduResponse, ReturnCode, CLA};
use crate::error::DeviceError;
use crate::path::DerivationPath;
use crate::signature::{SignResponse, SignUpdateCallResponse};
use crate::transport::DeviceConnection;
use crate::version::Version;
use hardsign_codec::DevicePublicKey;
use tracing::debug;

/// Identity material reported by the device for one derivation path.
#[derive(Debug, Clone)]
pub struct DeviceAddress {
    /// Principal text as shown on (and claimed by) the device.
    pub principal_text: String,
    /// The public key, parsed and validated.
    pub public_key: DevicePublicKey,
}

/// Protocol client bound to one open connection.
pub struct LedgerApp<'conn> {
    connection: &'conn mut dyn DeviceConnection,
}

impl<'conn> LedgerApp<'conn> {
    pub fn new(connection: &'conn mut dyn DeviceConnection) -> Self {
        Self { connection }
    }

    /// Fetches the application version.
    ///
    /// Response payload: `[test_mode, major, minor, patch, ..]`.
    pub async fn get_version(&mut self) -> Result<Version, DeviceError> {
        let response = self
            .connection
            .exchange(&ApduCommand {
                cla: CLA,
                ins: apdu::ins::GET_VERSION,
                p1: 0,
                p2: 0,
                data: Vec::new(),
            })
            .await?;
        ensure_success(&response)?;
        if response.data.len() < 4 {
            return Err(DeviceError::MalformedResponse {
                reason: format!("version payload of {} bytes", response.data.len()),
            });
        }
        let version = Version::new(response.data[1], response.data[2], response.data[3]);
        debug!(%version, "device reported app version");
        Ok(version)
    }

    /// Fetches the address and public key for a derivation path without
    /// user interaction.
    ///
    /// The device-claimed principal is recomputed from the returned public
    /// key and compared; a mismatch means the device returned an
    /// inconsistent identity (buggy or compromised) and is a hard failure.
    pub async fn get_address_and_public_key(
        &mut self,
        path: &DerivationPath,
    ) -> Result<DeviceAddress, DeviceError> {
        self.fetch_address(path, apdu::addr::SILENT).await
    }

    /// Same exchange, but the device displays the address and waits for
    /// the user to confirm it against what the host shows.
    pub async fn show_address_and_public_key(
        &mut self,
        path: &DerivationPath,
    ) -> Result<DeviceAddress, DeviceError> {
        self.fetch_address(path, apdu::addr::SHOW).await
    }

    async fn fetch_address(
        &mut self,
        path: &DerivationPath,
        p1: u8,
    ) -> Result<DeviceAddress, DeviceError> {
        let response = self
            .connection
            .exchange(&ApduCommand {
                cla: CLA,
                ins: apdu::ins::GET_ADDR_SECP256K1,
                p1,
                p2: 0,
                data: path.serialize(),
            })
            .await?;
        ensure_success(&response)?;

        let address = parse_address_payload(&response.data)?;
        let recomputed = address.public_key.principal()?.to_text();
        if recomputed != address.principal_text {
            return Err(DeviceError::IdentityMismatch {
                reason: format!(
                    "device claims principal {} but its public key derives {recomputed}",
                    address.principal_text
                ),
            });
        }
        debug!(principal = %address.principal_text, "device identity fetched");
        Ok(address)
    }

    /// Signs one canonical request; used for the non-call path.
    pub async fn sign(
        &mut self,
        path: &DerivationPath,
        payload: &[u8],
    ) -> Result<SignResponse, DeviceError> {
        let response = self
            .send_chunked(apdu::ins::SIGN_SECP256K1, path, payload)
            .await?;
        let (return_code, error_message, data) = split_response(response);
        Ok(SignResponse {
            return_code,
            error_message,
            signature: data.filter(|bytes| !bytes.is_empty()),
        })
    }

    /// Signs a call request and its read-state companion in one user
    /// approval, yielding two independent signatures.
    ///
    /// Payload framing: each blob prefixed by its length as a little-endian
    /// u32. Response framing: each signature prefixed by its length as one
    /// byte.
    pub async fn sign_update_call(
        &mut self,
        path: &DerivationPath,
        call_payload: &[u8],
        read_state_payload: &[u8],
    ) -> Result<SignUpdateCallResponse, DeviceError> {
        if call_payload.is_empty() || read_state_payload.is_empty() {
            return Err(DeviceError::EmptyPayload);
        }
        let mut payload =
            Vec::with_capacity(8 + call_payload.len() + read_state_payload.len());
        payload.extend_from_slice(&(call_payload.len() as u32).to_le_bytes());
        payload.extend_from_slice(call_payload);
        payload.extend_from_slice(&(read_state_payload.len() as u32).to_le_bytes());
        payload.extend_from_slice(read_state_payload);

        let response = self
            .send_chunked(apdu::ins::SIGN_UPDATE_CALL, path, &payload)
            .await?;
        let (return_code, error_message, data) = split_response(response);

        let (call_signature, read_state_signature) = match data {
            Some(bytes) => parse_dual_signatures(&bytes)?,
            None => (None, None),
        };
        Ok(SignUpdateCallResponse {
            return_code,
            error_message,
            call_signature,
            read_state_signature,
        })
    }

    /// Sends the path chunk and payload chunks; intermediate chunks must
    /// succeed, the final response carries the operation's result.
    async fn send_chunked(
        &mut self,
        ins: u8,
        path: &DerivationPath,
        payload: &[u8],
    ) -> Result<ApduResponse, DeviceError> {
        let chunks = apdu::chunked_payload(path.serialize(), payload)?;
        debug!(ins, chunks = chunks.len(), bytes = payload.len(), "sending chunked payload");

        let last = chunks.len() - 1;
        let mut final_response = None;
        for (i, (p1, data)) in chunks.into_iter().enumerate() {
            let response = self
                .connection
                .exchange(&ApduCommand { cla: CLA, ins, p1, p2: 0, data })
                .await?;
            if i < last {
                ensure_success(&response)?;
            } else {
                final_response = Some(response);
            }
        }
        // The loop always runs: chunked_payload rejects empty payloads.
        final_response.ok_or(DeviceError::EmptyPayload)
    }
}

/// Maps a non-success status on a non-signing exchange. An on-device
/// decline is the user's, everything else is a transport-level failure that
/// keeps the raw code and any ASCII message the device attached.
fn ensure_success(response: &ApduResponse) -> Result<(), DeviceError> {
    match response.return_code {
        ReturnCode::TransactionRejected => Err(DeviceError::UserRejected),
        code if code.is_success() => Ok(()),
        code => Err(DeviceError::Transport {
            message: format!(
                "device returned error {code}: {}",
                device_message(&response.data).unwrap_or_else(|| "no message".to_string())
            ),
        }),
    }
}

/// On signing exchanges the final response is handed to the signature
/// validator whole; this splits it into the validator's inputs. For
/// non-success codes any payload bytes are a diagnostic message, not a
/// signature.
fn split_response(response: ApduResponse) -> (ReturnCode, Option<String>, Option<Vec<u8>>) {
    if response.return_code.is_success() {
        (response.return_code, None, Some(response.data))
    } else {
        let message = device_message(&response.data);
        (response.return_code, message, None)
    }
}

fn device_message(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    String::from_utf8(data.to_vec()).ok()
}

/// Address payload: 65-byte SEC1 uncompressed key, one length byte, then
/// the principal text.
fn parse_address_payload(data: &[u8]) -> Result<DeviceAddress, DeviceError> {
    const KEY_LEN: usize = 65;
    if data.len() < KEY_LEN + 1 {
        return Err(DeviceError::MalformedResponse {
            reason: format!("address payload of {} bytes", data.len()),
        });
    }
    let public_key = DevicePublicKey::from_sec1(&data[..KEY_LEN])?;
    let text_len = data[KEY_LEN] as usize;
    let text_bytes = data
        .get(KEY_LEN + 1..KEY_LEN + 1 + text_len)
        .ok_or_else(|| DeviceError::MalformedResponse {
            reason: "principal text truncated".to_string(),
        })?;
    let principal_text =
        String::from_utf8(text_bytes.to_vec()).map_err(|_| DeviceError::MalformedResponse {
            reason: "principal text is not UTF-8".to_string(),
        })?;
    Ok(DeviceAddress {
        principal_text,
        public_key,
    })
}

/// Dual-signature payload: two one-byte-length-prefixed signatures.
fn parse_dual_signatures(
    data: &[u8],
) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>), DeviceError> {
    let (first, rest) = take_prefixed(data)?;
    let (second, tail) = take_prefixed(rest)?;
    if !tail.is_empty() {
        return Err(DeviceError::MalformedResponse {
            reason: format!("{} trailing bytes after signatures", tail.len()),
        });
    }
    Ok((first, second))
}

fn take_prefixed(data: &[u8]) -> Result<(Option<Vec<u8>>, &[u8]), DeviceError> {
    let Some((&len, rest)) = data.split_first() else {
        return Ok((None, data));
    };
    let len = len as usize;
    if rest.len() < len {
        return Err(DeviceError::MalformedResponse {
            reason: "signature truncated".to_string(),
        });
    }
    let (bytes, tail) = rest.split_at(len);
    let field = if bytes.is_empty() { None } else { Some(bytes.to_vec()) };
    Ok((field, tail))
}
