//! Signature responses and their validation.
//!
//! Nothing a peripheral returns is trusted until it passes through here.
//! Validation is a three-way split, and each failure is a distinct error
//! because each calls for a different remediation: a rejection means the
//! user declined (retry is a new approval), a missing signature usually
//! means a wedged device (replug), and a wrong length means an incompatible
//! application (update firmware).

use crate::apdu::ReturnCode;
use crate::error::DeviceError;
use std::fmt;

/// Exact length of a valid signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Placeholder used when the device supplied no diagnostic message.
const NO_MESSAGE: &str = "undefined";

/// A validated 64-byte signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Raw single-signature response from the device.
#[derive(Debug, Clone)]
pub struct SignResponse {
    pub return_code: ReturnCode,
    pub error_message: Option<String>,
    pub signature: Option<Vec<u8>>,
}

/// Raw dual-signature response from the device: one user approval, two
/// independent signatures.
#[derive(Debug, Clone)]
pub struct SignUpdateCallResponse {
    pub return_code: ReturnCode,
    pub error_message: Option<String>,
    pub call_signature: Option<Vec<u8>>,
    pub read_state_signature: Option<Vec<u8>>,
}

/// The validated pair of signatures covering a call and its read-state
/// companion. Partial success is not a state: both are present and 64 bytes
/// or the whole result is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSignatures {
    pub call_signature: Signature,
    pub read_state_signature: Signature,
}

/// Validates a single-signature response.
pub fn decode_signature(response: &SignResponse) -> Result<Signature, DeviceError> {
    check_return_code(response.return_code)?;
    let signature = check_signature(
        response.signature.as_deref(),
        response.return_code,
        response.error_message.as_deref(),
    )?;
    check_success(response.return_code, response.error_message.as_deref())?;
    Ok(signature)
}

/// Validates a dual-signature response. Both signatures are validated
/// independently; the first failure wins.
pub fn decode_update_signatures(
    response: &SignUpdateCallResponse,
) -> Result<RequestSignatures, DeviceError> {
    check_return_code(response.return_code)?;
    let call_signature = check_signature(
        response.call_signature.as_deref(),
        response.return_code,
        response.error_message.as_deref(),
    )?;
    let read_state_signature = check_signature(
        response.read_state_signature.as_deref(),
        response.return_code,
        response.error_message.as_deref(),
    )?;
    check_success(response.return_code, response.error_message.as_deref())?;
    Ok(RequestSignatures {
        call_signature,
        read_state_signature,
    })
}

/// An explicit on-device rejection outranks everything else in the
/// response, including any signature bytes that came along with it.
fn check_return_code(return_code: ReturnCode) -> Result<(), DeviceError> {
    if return_code == ReturnCode::TransactionRejected {
        return Err(DeviceError::UserRejected);
    }
    Ok(())
}

fn check_signature(
    signature: Option<&[u8]>,
    return_code: ReturnCode,
    error_message: Option<&str>,
) -> Result<Signature, DeviceError> {
    let Some(bytes) = signature else {
        return Err(DeviceError::SignatureMissing {
            return_code,
            message: error_message.unwrap_or(NO_MESSAGE).to_string(),
        });
    };
    let sized: [u8; SIGNATURE_LENGTH] = bytes
        .try_into()
        .map_err(|_| DeviceError::wrong_signature_length(bytes.len()))?;
    Ok(Signature(sized))
}

/// A well-formed signature under a non-success status is still untrusted.
/// Checked last so rejection, presence, and length keep their specific
/// diagnostics.
fn check_success(
    return_code: ReturnCode,
    error_message: Option<&str>,
) -> Result<(), DeviceError> {
    if return_code.is_success() {
        return Ok(());
    }
    Err(DeviceError::Transport {
        message: format!(
            "device returned error {return_code}: {}",
            error_message.unwrap_or(NO_MESSAGE)
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_signature() -> Vec<u8> {
        vec![0xab; SIGNATURE_LENGTH]
    }

    #[test]
    fn missing_signature_reports_code_and_message() {
        let response = SignResponse {
            return_code: ReturnCode::UnknownError,
            error_message: None,
            signature: None,
        };
        let err = decode_signature(&response).unwrap_err();
        assert_eq!(err.to_string(), "Signature not provided (28416): undefined");
        assert!(matches!(err, DeviceError::SignatureMissing { .. }));
    }

    #[test]
    fn rejection_wins_regardless_of_signature_content() {
        let response = SignResponse {
            return_code: ReturnCode::TransactionRejected,
            error_message: None,
            signature: Some(b"test".to_vec()),
        };
        let err = decode_signature(&response).unwrap_err();
        assert_eq!(err.to_string(), "User rejected transaction.");
        assert!(matches!(err, DeviceError::UserRejected));
    }

    #[test]
    fn wrong_length_reports_both_lengths() {
        let response = SignResponse {
            return_code: ReturnCode::NoErrors,
            error_message: None,
            signature: Some(vec![0xab; 68]),
        };
        let err = decode_signature(&response).unwrap_err();
        assert_eq!(err.to_string(), "Signature has length 68 instead of 64.");
        assert!(matches!(err, DeviceError::SignatureMalformed { .. }));
    }

    #[test]
    fn valid_response_yields_the_signature() {
        let response = SignResponse {
            return_code: ReturnCode::NoErrors,
            error_message: None,
            signature: Some(valid_signature()),
        };
        let signature = decode_signature(&response).unwrap();
        assert_eq!(signature.to_vec(), valid_signature());
    }

    #[test]
    fn well_formed_signature_under_error_status_is_untrusted() {
        let response = SignResponse {
            return_code: ReturnCode::UnknownError,
            error_message: Some("internal fault".to_string()),
            signature: Some(valid_signature()),
        };
        let err = decode_signature(&response).unwrap_err();
        assert!(matches!(err, DeviceError::Transport { .. }));
        assert!(err.to_string().contains("28416"));
        assert!(err.to_string().contains("internal fault"));
    }

    #[test]
    fn dual_missing_signatures_report_code_and_message() {
        let response = SignUpdateCallResponse {
            return_code: ReturnCode::UnknownError,
            error_message: None,
            call_signature: None,
            read_state_signature: None,
        };
        let err = decode_update_signatures(&response).unwrap_err();
        assert_eq!(err.to_string(), "Signature not provided (28416): undefined");
    }

    #[test]
    fn dual_rejection_wins() {
        let response = SignUpdateCallResponse {
            return_code: ReturnCode::TransactionRejected,
            error_message: None,
            call_signature: Some(b"test".to_vec()),
            read_state_signature: Some(b"test".to_vec()),
        };
        let err = decode_update_signatures(&response).unwrap_err();
        assert_eq!(err.to_string(), "User rejected transaction.");
    }

    #[test]
    fn dual_wrong_length_call_signature_fails_first() {
        let response = SignUpdateCallResponse {
            return_code: ReturnCode::UnknownError,
            error_message: None,
            call_signature: Some(vec![0xab; 67]),
            read_state_signature: Some(valid_signature()),
        };
        let err = decode_update_signatures(&response).unwrap_err();
        assert_eq!(err.to_string(), "Signature has length 67 instead of 64.");
    }

    #[test]
    fn dual_partial_success_is_invalid() {
        let response = SignUpdateCallResponse {
            return_code: ReturnCode::NoErrors,
            error_message: None,
            call_signature: Some(valid_signature()),
            read_state_signature: None,
        };
        assert!(matches!(
            decode_update_signatures(&response).unwrap_err(),
            DeviceError::SignatureMissing { .. }
        ));
    }

    #[test]
    fn dual_valid_response_yields_both_signatures() {
        let response = SignUpdateCallResponse {
            return_code: ReturnCode::NoErrors,
            error_message: None,
            call_signature: Some(valid_signature()),
            read_state_signature: Some(vec![0xcd; SIGNATURE_LENGTH]),
        };
        let signatures = decode_update_signatures(&response).unwrap();
        assert_eq!(signatures.call_signature.to_vec(), valid_signature());
        assert_eq!(
            signatures.read_state_signature.to_vec(),
            vec![0xcd; SIGNATURE_LENGTH]
        );
    }
}
