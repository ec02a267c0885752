//! Device application version gate.

use crate::error::DeviceError;
use std::fmt;

/// Minimum supported application version. Published October 2023; the first
/// release that signs every Candid transaction type this client emits.
pub const MINIMUM_SUPPORTED_VERSION: Version = Version {
    major: 2,
    minor: 4,
    patch: 9,
};

/// A three-component application version.
///
/// The derived ordering is lexicographic by (major, minor, patch), which is
/// exactly the comparison the gate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Rejects device applications older than the minimum supported version.
///
/// Called before every signing operation, on a freshly fetched version: the
/// device application can be swapped or upgraded between operations in a
/// long-lived session, so a once-per-session check would go stale.
pub fn ensure_supported(current: Version) -> Result<(), DeviceError> {
    if current < MINIMUM_SUPPORTED_VERSION {
        return Err(DeviceError::DeprecatedApplication {
            current,
            minimum: MINIMUM_SUPPORTED_VERSION,
        });
    }
    Ok(())
}
