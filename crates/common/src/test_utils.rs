//! Test utilities for aoap-switch
//!
//! Provides mock device descriptions and helper functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_device_info, create_mock_accessory};
//!
//! let phone = create_mock_device_info(1, 0x18d1, 0x4ee2);
//! let accessory = create_mock_accessory(&phone);
//! assert!(accessory.is_accessory_mode());
//! assert_eq!(accessory.port_path(), phone.port_path());
//! ```

use protocol::{AoapSwitchRequest, DeviceInfo, PortPath};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a mock DeviceInfo for testing
///
/// The device sits on bus 1 at root port `id`, with address `id` and a
/// serial number derived from `id`.
///
/// # Example
/// ```
/// use common::test_utils::create_mock_device_info;
///
/// let device = create_mock_device_info(3, 0x1234, 0x5678);
/// assert_eq!(device.device_address, 3);
/// assert_eq!(device.port_numbers, vec![3]);
/// ```
pub fn create_mock_device_info(id: u8, vendor_id: u16, product_id: u16) -> DeviceInfo {
    DeviceInfo::new(1, id, vendor_id, product_id)
        .with_port_path(PortPath::new(1, vec![id]))
        .with_serial(format!("SN{:06}", id))
}

/// Create a mock Android phone in its normal (non-accessory) mode
pub fn create_mock_phone(id: u8) -> DeviceInfo {
    create_mock_device_info(id, 0x18d1, 0x4ee2)
}

/// The same physical device after it re-enumerated in accessory mode
///
/// Port path and serial are preserved; the address moves and the PID becomes
/// the plain accessory PID.
pub fn create_mock_accessory(device: &DeviceInfo) -> DeviceInfo {
    DeviceInfo {
        device_address: device.device_address.wrapping_add(64),
        vendor_id: protocol::aoap::ACCESSORY_VENDOR_ID,
        product_id: 0x2d00,
        ..device.clone()
    }
}

/// The same physical device after a plain re-enumeration (new address only)
pub fn create_mock_reenumerated(device: &DeviceInfo) -> DeviceInfo {
    DeviceInfo {
        device_address: device.device_address.wrapping_add(64),
        ..device.clone()
    }
}

/// Create a handshake request with every string filled in
pub fn create_mock_request(device: DeviceInfo) -> AoapSwitchRequest {
    AoapSwitchRequest::new(device, "Test Manufacturer", "Test Model")
        .with_description("Test accessory")
        .with_version("1.0")
        .with_uri("https://example.com/accessory")
        .with_serial("0000001")
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_device_info() {
        let device = create_mock_device_info(42, 0x1234, 0x5678);

        assert_eq!(device.device_address, 42);
        assert_eq!(device.vendor_id, 0x1234);
        assert_eq!(device.product_id, 0x5678);
        assert_eq!(device.serial_number.as_deref(), Some("SN000042"));
        assert_eq!(device.port_path(), Some(PortPath::new(1, vec![42])));
    }

    #[test]
    fn test_mock_accessory_keeps_topology() {
        let phone = create_mock_phone(2);
        let accessory = create_mock_accessory(&phone);

        assert!(!phone.is_accessory_mode());
        assert!(accessory.is_accessory_mode());
        assert_ne!(phone.device_address, accessory.device_address);
        assert_eq!(phone.port_path(), accessory.port_path());
        assert_eq!(phone.serial_number, accessory.serial_number);
    }

    #[test]
    fn test_mock_request_fills_strings() {
        let request = create_mock_request(create_mock_phone(1));
        assert!(
            request
                .identification_strings()
                .iter()
                .all(|(_, v)| !v.is_empty())
        );
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        assert!(result.is_err());
    }
}
