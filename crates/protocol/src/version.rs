//! Accessory protocol version management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accessory protocol version reported by `ACCESSORY_GET_PROTOCOL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessoryProtocolVersion {
    /// Device does not speak the accessory protocol
    Unsupported,
    /// AOA 1.0: identification strings and start
    V1,
    /// AOA 2.0: adds audio and HID support
    V2,
    /// A version newer than this crate knows about
    Newer(u16),
}

impl AccessoryProtocolVersion {
    /// Decode the little-endian word returned by the device
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => AccessoryProtocolVersion::Unsupported,
            1 => AccessoryProtocolVersion::V1,
            2 => AccessoryProtocolVersion::V2,
            n => AccessoryProtocolVersion::Newer(n),
        }
    }

    /// Decode from the control transfer buffer
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [lo, hi, ..] => Self::from_raw(u16::from_le_bytes([*lo, *hi])),
            [lo] => Self::from_raw(u16::from(*lo)),
            [] => AccessoryProtocolVersion::Unsupported,
        }
    }

    /// Check if the device can be switched into accessory mode
    pub fn is_supported(&self) -> bool {
        !matches!(self, AccessoryProtocolVersion::Unsupported)
    }
}

impl fmt::Display for AccessoryProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessoryProtocolVersion::Unsupported => f.write_str("unsupported"),
            AccessoryProtocolVersion::V1 => f.write_str("AOA 1.0"),
            AccessoryProtocolVersion::V2 => f.write_str("AOA 2.0"),
            AccessoryProtocolVersion::Newer(n) => write!(f, "AOA {}.0", n),
        }
    }
}
