//! Android Open Accessory control request constants
//!
//! The accessory handshake is a sequence of vendor control transfers on
//! endpoint 0: an optional protocol query, six identification strings, and a
//! final start request after which the device re-enumerates with Google's
//! accessory vendor/product IDs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Google vendor ID used by devices in accessory mode
pub const ACCESSORY_VENDOR_ID: u16 = 0x18d1;

/// Accessory product IDs (accessory, +adb, audio, audio+adb, accessory+audio, accessory+audio+adb)
pub const ACCESSORY_PRODUCT_IDS: std::ops::RangeInclusive<u16> = 0x2d00..=0x2d05;

/// Vendor request: read the supported accessory protocol version (IN, 2 bytes)
pub const ACCESSORY_GET_PROTOCOL: u8 = 51;

/// Vendor request: send one identification string (OUT)
pub const ACCESSORY_SEND_STRING: u8 = 52;

/// Vendor request: switch into accessory mode (OUT, no data)
pub const ACCESSORY_START: u8 = 53;

/// bmRequestType for host-to-device vendor requests
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// bmRequestType for device-to-host vendor requests
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xc0;

/// Check whether a VID/PID pair belongs to a device presenting as an accessory
pub fn is_accessory_product(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == ACCESSORY_VENDOR_ID && ACCESSORY_PRODUCT_IDS.contains(&product_id)
}

/// Identification strings sent during the handshake
///
/// The discriminant is the `wIndex` of the `ACCESSORY_SEND_STRING` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum AccessoryString {
    Manufacturer = 0,
    Model = 1,
    Description = 2,
    Version = 3,
    Uri = 4,
    Serial = 5,
}

impl AccessoryString {
    /// Handshake order
    pub const ALL: [AccessoryString; 6] = [
        AccessoryString::Manufacturer,
        AccessoryString::Model,
        AccessoryString::Description,
        AccessoryString::Version,
        AccessoryString::Uri,
        AccessoryString::Serial,
    ];

    /// `wIndex` value for this string
    pub fn index(self) -> u16 {
        self as u16
    }

    /// Encode a string payload (NUL terminated, as the device expects)
    pub fn encode(value: &str) -> Vec<u8> {
        let mut payload = Vec::with_capacity(value.len() + 1);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        payload
    }
}

impl fmt::Display for AccessoryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessoryString::Manufacturer => "manufacturer",
            AccessoryString::Model => "model",
            AccessoryString::Description => "description",
            AccessoryString::Version => "version",
            AccessoryString::Uri => "uri",
            AccessoryString::Serial => "serial",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessory_product_ids() {
        assert!(is_accessory_product(0x18d1, 0x2d00));
        assert!(is_accessory_product(0x18d1, 0x2d01));
        assert!(is_accessory_product(0x18d1, 0x2d05));

        assert!(!is_accessory_product(0x18d1, 0x2d06));
        assert!(!is_accessory_product(0x18d1, 0x4ee2));
        assert!(!is_accessory_product(0x04e8, 0x2d00));
    }

    #[test]
    fn test_string_indices_follow_handshake_order() {
        let indices: Vec<u16> = AccessoryString::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_encode_appends_nul() {
        assert_eq!(AccessoryString::encode("Acme"), b"Acme\0".to_vec());
        assert_eq!(AccessoryString::encode(""), vec![0]);
    }
}
