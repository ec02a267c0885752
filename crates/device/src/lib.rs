//! Signing-device transport and application protocol.
//!
//! This crate speaks to a Ledger-class hardware wallet: it frames commands
//! as APDUs, chunks large payloads, drives the device application's command
//! set (fetch public key, fetch version, sign, dual-sign), gates every
//! signing operation on a minimum application version, and validates every
//! signature the untrusted peripheral returns before anyone trusts it.
//!
//! The physical transport (USB HID, WebHID, a test double) is injected
//! through the [`transport::DeviceTransport`] trait; this crate never loads
//! or enumerates devices itself.

pub mod apdu;
pub mod app;
pub mod error;
pub mod path;
pub mod signature;
pub mod testing;
pub mod transport;
pub mod version;

pub use apdu::{ApduCommand, ApduResponse, ReturnCode};
pub use app::{DeviceAddress, LedgerApp};
pub use error::DeviceError;
pub use path::{DerivationPath, DEFAULT_DERIVE_PATH};
pub use signature::{
    decode_signature, decode_update_signatures, RequestSignatures, Signature, SignResponse,
    SignUpdateCallResponse, SIGNATURE_LENGTH,
};
pub use transport::{DeviceConnection, DeviceTransport};
pub use version::{Version, MINIMUM_SUPPORTED_VERSION};
