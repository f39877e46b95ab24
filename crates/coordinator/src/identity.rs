//! Device identity matching policy
//!
//! A reset gives a device a new address, and an accessory switch also gives it
//! new vendor/product IDs, so "is this the device we are waiting for" cannot be
//! answered by equality. The policy is pluggable because what survives a
//! re-enumeration depends on the platform and the hardware.

use protocol::DeviceInfo;

/// Predicates the transition engine uses to recognize its device
pub trait DeviceMatcher: Send + Sync {
    /// Does `candidate`, reported as detached, refer to `original`?
    fn is_likely_same_removal(&self, original: &DeviceInfo, candidate: &DeviceInfo) -> bool;

    /// Is `candidate`, reported as attached, the same physical device as `original`?
    fn is_likely_same_physical_device(&self, original: &DeviceInfo, candidate: &DeviceInfo)
    -> bool;
}

/// Topology-based matching
///
/// The port a device is plugged into does not change across a mode switch,
/// while its address always does. Vendor/product IDs are ignored; serial
/// numbers are used only to veto a match or when no port path is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortPathMatcher;

impl PortPathMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Serial numbers are comparable unless either side is in accessory mode,
    /// where some devices report the serial string sent during the handshake.
    fn serials_conflict(original: &DeviceInfo, candidate: &DeviceInfo) -> bool {
        if original.is_accessory_mode() != candidate.is_accessory_mode() {
            return false;
        }
        match (&original.serial_number, &candidate.serial_number) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }
}

impl DeviceMatcher for PortPathMatcher {
    fn is_likely_same_removal(&self, original: &DeviceInfo, candidate: &DeviceInfo) -> bool {
        match (original.port_path(), candidate.port_path()) {
            (Some(a), Some(b)) => a == b,
            // The departing handle still carries the address it was enumerated with
            _ => {
                original.bus_number == candidate.bus_number
                    && original.device_address == candidate.device_address
            }
        }
    }

    fn is_likely_same_physical_device(
        &self,
        original: &DeviceInfo,
        candidate: &DeviceInfo,
    ) -> bool {
        match (original.port_path(), candidate.port_path()) {
            (Some(a), Some(b)) => a == b && !Self::serials_conflict(original, candidate),
            _ => matches!(
                (&original.serial_number, &candidate.serial_number),
                (Some(a), Some(b)) if a == b
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PortPath;

    fn phone() -> DeviceInfo {
        DeviceInfo::new(1, 7, 0x18d1, 0x4ee2)
            .with_port_path(PortPath::new(1, vec![2, 3]))
            .with_serial("ABC123")
    }

    #[test]
    fn test_removal_matches_on_port_path() {
        let matcher = PortPathMatcher::new();
        let original = phone();

        // Same port, already showing the accessory identity
        let departed = DeviceInfo {
            product_id: 0x2d01,
            ..original.clone()
        };
        assert!(matcher.is_likely_same_removal(&original, &departed));

        let neighbour = original
            .clone()
            .with_port_path(PortPath::new(1, vec![2, 4]));
        assert!(!matcher.is_likely_same_removal(&original, &neighbour));
    }

    #[test]
    fn test_removal_falls_back_to_address() {
        let matcher = PortPathMatcher::new();
        let original = DeviceInfo::new(2, 9, 0x1234, 0x5678);

        assert!(matcher.is_likely_same_removal(&original, &DeviceInfo::new(2, 9, 0, 0)));
        assert!(!matcher.is_likely_same_removal(&original, &DeviceInfo::new(2, 10, 0x1234, 0x5678)));
        assert!(!matcher.is_likely_same_removal(&original, &DeviceInfo::new(3, 9, 0x1234, 0x5678)));
    }

    #[test]
    fn test_physical_match_survives_mode_switch() {
        let matcher = PortPathMatcher::new();
        let original = phone();
        let accessory = DeviceInfo {
            device_address: 8,
            product_id: 0x2d00,
            serial_number: Some("handshake-serial".to_string()),
            ..original.clone()
        };

        assert!(matcher.is_likely_same_physical_device(&original, &accessory));
    }

    #[test]
    fn test_physical_match_vetoed_by_serial() {
        let matcher = PortPathMatcher::new();
        let original = phone();
        let other_phone = DeviceInfo {
            device_address: 8,
            ..original.clone()
        }
        .with_serial("XYZ999");

        assert!(!matcher.is_likely_same_physical_device(&original, &other_phone));
    }

    #[test]
    fn test_physical_match_without_port_path_needs_serial() {
        let matcher = PortPathMatcher::new();
        let original = DeviceInfo::new(1, 4, 0x18d1, 0x4ee2).with_serial("S1");

        assert!(matcher.is_likely_same_physical_device(
            &original,
            &DeviceInfo::new(1, 5, 0x18d1, 0x2d00).with_serial("S1")
        ));
        assert!(!matcher.is_likely_same_physical_device(
            &original,
            &DeviceInfo::new(1, 5, 0x18d1, 0x2d00)
        ));
        assert!(!matcher.is_likely_same_physical_device(
            &DeviceInfo::new(1, 4, 0x18d1, 0x4ee2),
            &DeviceInfo::new(1, 5, 0x18d1, 0x4ee2)
        ));
    }
}
