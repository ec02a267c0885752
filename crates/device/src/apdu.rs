//! APDU command/response framing.
//!
//! The device speaks ISO 7816-style APDUs: a five-byte header (class,
//! instruction, two parameters, payload length) followed by at most 255
//! payload bytes. Responses end in a two-byte status word. Payloads larger
//! than one APDU are chunked by the caller with an init/add/last marker in
//! `p1`; chunk zero always carries the serialized derivation path.

use crate::error::DeviceError;
use std::fmt;

/// Application class byte for the signing app.
pub const CLA: u8 = 0x11;

/// Maximum payload bytes per chunk.
pub const CHUNK_SIZE: usize = 250;

/// Instruction bytes understood by the device application.
pub mod ins {
    /// Fetch the application version.
    pub const GET_VERSION: u8 = 0x00;
    /// Fetch the secp256k1 address and public key for a derivation path.
    pub const GET_ADDR_SECP256K1: u8 = 0x01;
    /// Sign a single canonical request.
    pub const SIGN_SECP256K1: u8 = 0x02;
    /// Sign a call request and its read-state companion in one approval.
    pub const SIGN_UPDATE_CALL: u8 = 0x03;
}

/// `p1` markers for chunked payloads.
pub mod chunk {
    pub const INIT: u8 = 0x00;
    pub const ADD: u8 = 0x01;
    pub const LAST: u8 = 0x02;
}

/// `p1` values for address retrieval.
pub mod addr {
    /// Return the address without user interaction.
    pub const SILENT: u8 = 0x00;
    /// Display the address on-device and wait for user confirmation.
    pub const SHOW: u8 = 0x01;
}

/// Status words the device application emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// 0x9000: success.
    NoErrors,
    /// 0x6986: the user declined on-device.
    TransactionRejected,
    /// 0x6E00: class byte not recognized.
    ClaNotSupported,
    /// 0x6D00: instruction not recognized.
    InsNotSupported,
    /// 0x6A80: the payload failed on-device validation.
    DataInvalid,
    /// 0x6F00: unclassified device error.
    UnknownError,
    /// Any status word this client does not know by name.
    Other(u16),
}

impl ReturnCode {
    pub fn from_word(word: u16) -> Self {
        match word {
            0x9000 => Self::NoErrors,
            0x6986 => Self::TransactionRejected,
            0x6e00 => Self::ClaNotSupported,
            0x6d00 => Self::InsNotSupported,
            0x6a80 => Self::DataInvalid,
            0x6f00 => Self::UnknownError,
            other => Self::Other(other),
        }
    }

    pub fn word(&self) -> u16 {
        match self {
            Self::NoErrors => 0x9000,
            Self::TransactionRejected => 0x6986,
            Self::ClaNotSupported => 0x6e00,
            Self::InsNotSupported => 0x6d00,
            Self::DataInvalid => 0x6a80,
            Self::UnknownError => 0x6f00,
            Self::Other(word) => *word,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::NoErrors)
    }
}

impl fmt::Display for ReturnCode {
    /// Displays the decimal status word, the form users see in error
    /// messages (e.g. `28416` for 0x6F00).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word())
    }
}

/// A single APDU command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl ApduCommand {
    /// Serializes to the wire form: header plus payload.
    pub fn serialize(&self) -> Result<Vec<u8>, DeviceError> {
        if self.data.len() > 255 {
            return Err(DeviceError::Transport {
                message: format!("APDU payload of {} bytes exceeds 255", self.data.len()),
            });
        }
        let mut out = Vec::with_capacity(5 + self.data.len());
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, self.data.len() as u8]);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// A parsed APDU response: payload plus decoded status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub return_code: ReturnCode,
}

impl ApduResponse {
    /// Parses raw response bytes; the trailing two bytes are the status
    /// word.
    pub fn from_raw(raw: &[u8]) -> Result<Self, DeviceError> {
        if raw.len() < 2 {
            return Err(DeviceError::MalformedResponse {
                reason: format!("response of {} bytes has no status word", raw.len()),
            });
        }
        let (data, status) = raw.split_at(raw.len() - 2);
        let word = u16::from_be_bytes([status[0], status[1]]);
        Ok(Self {
            data: data.to_vec(),
            return_code: ReturnCode::from_word(word),
        })
    }

    /// Builds a response from parts (used by transports that already split
    /// the status word, and by test doubles).
    pub fn new(data: Vec<u8>, return_code: ReturnCode) -> Self {
        Self { data, return_code }
    }
}

/// Splits a payload into APDU-sized chunks, prefixed by the path chunk.
///
/// Returns `(p1, bytes)` pairs ready to send in order.
pub fn chunked_payload(path_bytes: Vec<u8>, payload: &[u8]) -> Result<Vec<(u8, Vec<u8>)>, DeviceError> {
    if payload.is_empty() {
        return Err(DeviceError::EmptyPayload);
    }
    let mut chunks = vec![(chunk::INIT, path_bytes)];
    let pieces: Vec<&[u8]> = payload.chunks(CHUNK_SIZE).collect();
    let last = pieces.len() - 1;
    for (i, piece) in pieces.into_iter().enumerate() {
        let marker = if i == last { chunk::LAST } else { chunk::ADD };
        chunks.push((marker, piece.to_vec()));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_header_then_payload() {
        let command = ApduCommand {
            cla: CLA,
            ins: ins::SIGN_SECP256K1,
            p1: chunk::LAST,
            p2: 0,
            data: vec![0xaa, 0xbb],
        };
        assert_eq!(
            command.serialize().unwrap(),
            vec![0x11, 0x02, 0x02, 0x00, 0x02, 0xaa, 0xbb]
        );
    }

    #[test]
    fn oversized_command_is_rejected() {
        let command = ApduCommand {
            cla: CLA,
            ins: ins::SIGN_SECP256K1,
            p1: 0,
            p2: 0,
            data: vec![0; 256],
        };
        assert!(command.serialize().is_err());
    }

    #[test]
    fn response_parses_status_word() {
        let response = ApduResponse::from_raw(&[0x01, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(response.data, vec![0x01, 0x02]);
        assert_eq!(response.return_code, ReturnCode::NoErrors);
        assert!(response.return_code.is_success());

        let rejected = ApduResponse::from_raw(&[0x69, 0x86]).unwrap();
        assert!(rejected.data.is_empty());
        assert_eq!(rejected.return_code, ReturnCode::TransactionRejected);
    }

    #[test]
    fn truncated_response_is_rejected() {
        assert!(ApduResponse::from_raw(&[0x90]).is_err());
    }

    #[test]
    fn return_code_displays_decimal_word() {
        assert_eq!(ReturnCode::UnknownError.to_string(), "28416");
        assert_eq!(ReturnCode::TransactionRejected.to_string(), "27014");
        assert_eq!(ReturnCode::NoErrors.to_string(), "36864");
    }

    #[test]
    fn chunking_marks_init_add_last() {
        let payload = vec![0u8; CHUNK_SIZE * 2 + 10];
        let chunks = chunked_payload(vec![1, 2, 3], &payload).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].0, chunk::INIT);
        assert_eq!(chunks[0].1, vec![1, 2, 3]);
        assert_eq!(chunks[1].0, chunk::ADD);
        assert_eq!(chunks[1].1.len(), CHUNK_SIZE);
        assert_eq!(chunks[2].0, chunk::ADD);
        assert_eq!(chunks[3].0, chunk::LAST);
        assert_eq!(chunks[3].1.len(), 10);
    }

    #[test]
    fn single_chunk_payload_is_marked_last() {
        let chunks = chunked_payload(vec![], &[0xff; 4]).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].0, chunk::LAST);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            chunked_payload(vec![], &[]),
            Err(DeviceError::EmptyPayload)
        ));
    }
}
