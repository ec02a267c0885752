//! Device transport abstraction.
//!
//! A transport knows how to open a session with the physical device; a
//! connection is that open session. Both are traits so the hardware layer
//! (USB HID, WebHID, a test double) is injected statically by the embedding
//! application rather than discovered at call time.
//!
//! Connect-failure classification happens in the transport implementation,
//! once: user/OS denial, unsupported host, zero devices, several devices,
//! or a catch-all that preserves the underlying message. Nothing downstream
//! re-derives these from strings.

use crate::apdu::{ApduCommand, ApduResponse};
use crate::error::DeviceError;
use async_trait::async_trait;

/// An open session with the signing device.
///
/// Exactly one logical operation uses a connection at a time, and every
/// caller must release it on every exit path: success, validation failure,
/// transport error, or user cancellation. Exchanges may block on user
/// on-device confirmation for an unbounded, human-scale time; no client-side
/// timeout is imposed. Cancellation belongs to the user and the OS layer.
#[async_trait]
pub trait DeviceConnection: Send {
    /// Sends one APDU and waits for the device's response.
    async fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse, DeviceError>;

    /// Releases the session. Must be safe to call exactly once per
    /// connection; the device handle leaks to the next caller otherwise.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Opens sessions with the signing device.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Opens a session. May wait on OS-level device enumeration or a
    /// physical user action (plugging in, approving a permission prompt).
    async fn connect(&self) -> Result<Box<dyn DeviceConnection>, DeviceError>;
}
