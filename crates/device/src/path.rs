//! BIP32-style derivation paths.

use crate::error::DeviceError;
use std::fmt;
use std::str::FromStr;

/// The default derivation path used for this platform's key pair.
pub const DEFAULT_DERIVE_PATH: &str = "m/44'/223'/0'/0/0";

const HARDENED: u32 = 0x8000_0000;
const MAX_COMPONENTS: usize = 10;

/// A parsed derivation path selecting one key pair on a multi-key device.
///
/// Immutable after construction; the identity carries one for its whole
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// The platform default, `m/44'/223'/0'/0/0`.
    pub fn platform_default() -> Self {
        Self(vec![44 | HARDENED, 223 | HARDENED, HARDENED, 0, 0])
    }

    /// Serializes for the device: component count byte followed by each
    /// component as a little-endian u32, hardened flag included.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.0.len() * 4);
        out.push(self.0.len() as u8);
        for component in &self.0 {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl FromStr for DerivationPath {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        if parts.next() != Some("m") {
            return Err(DeviceError::InvalidDerivationPath {
                reason: format!("{s:?} does not start with 'm/'"),
            });
        }
        let mut components = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            let value: u32 = digits.parse().map_err(|_| DeviceError::InvalidDerivationPath {
                reason: format!("component {part:?} is not a number"),
            })?;
            if value >= HARDENED {
                return Err(DeviceError::InvalidDerivationPath {
                    reason: format!("component {value} exceeds the hardened flag"),
                });
            }
            components.push(if hardened { value | HARDENED } else { value });
        }
        if components.is_empty() || components.len() > MAX_COMPONENTS {
            return Err(DeviceError::InvalidDerivationPath {
                reason: format!("{} components (expected 1..={MAX_COMPONENTS})", components.len()),
            });
        }
        Ok(Self(components))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in &self.0 {
            if component & HARDENED != 0 {
                write!(f, "/{}'", component & !HARDENED)?;
            } else {
                write!(f, "/{component}")?;
            }
        }
        Ok(())
    }
}
