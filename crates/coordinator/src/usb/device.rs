//! Conversions between rusb device objects and protocol types

use protocol::{DeviceInfo, TransportError};
use rusb::{Device, UsbContext};
use tracing::debug;

/// Describe a device without opening it
///
/// Safe to call from a hotplug callback: only cached descriptors and
/// topology are read, no transfers are issued.
pub fn describe_device<T: UsbContext>(device: &Device<T>) -> Result<DeviceInfo, rusb::Error> {
    let descriptor = device.device_descriptor()?;
    let port_numbers = device.port_numbers().unwrap_or_else(|e| {
        debug!(
            "No port path for bus={} addr={}: {}",
            device.bus_number(),
            device.address(),
            e
        );
        Vec::new()
    });

    let mut info = DeviceInfo::new(
        device.bus_number(),
        device.address(),
        descriptor.vendor_id(),
        descriptor.product_id(),
    );
    info.port_numbers = port_numbers;
    Ok(info)
}

/// Describe a device and read its serial number string if it has one
///
/// Opens the device, so it must not be called from a hotplug callback.
pub fn describe_device_with_serial<T: UsbContext>(
    device: &Device<T>,
) -> Result<DeviceInfo, rusb::Error> {
    let info = describe_device(device)?;
    let descriptor = device.device_descriptor()?;

    let serial = descriptor.serial_number_string_index().and_then(|idx| {
        device
            .open()
            .and_then(|handle| handle.read_string_descriptor_ascii(idx))
            .ok()
    });

    Ok(match serial {
        Some(serial) => info.with_serial(serial),
        None => info,
    })
}

/// Map rusb errors onto transport errors
pub fn map_rusb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::NoDevice | rusb::Error::NotFound => TransportError::NotFound,
        rusb::Error::Access => TransportError::Access,
        rusb::Error::Busy => TransportError::Busy,
        rusb::Error::Timeout => TransportError::Timeout,
        // A stalled vendor request means the device does not implement it
        rusb::Error::Pipe | rusb::Error::NotSupported => TransportError::NotSupported,
        rusb::Error::Io => TransportError::Io(err.to_string()),
        _ => TransportError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), TransportError::NotFound);
        assert_eq!(map_rusb_error(rusb::Error::NotFound), TransportError::NotFound);
        assert_eq!(map_rusb_error(rusb::Error::Access), TransportError::Access);
        assert_eq!(map_rusb_error(rusb::Error::Busy), TransportError::Busy);
        assert_eq!(map_rusb_error(rusb::Error::Timeout), TransportError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), TransportError::NotSupported);
        assert!(matches!(map_rusb_error(rusb::Error::Io), TransportError::Io(_)));
        assert!(matches!(
            map_rusb_error(rusb::Error::Overflow),
            TransportError::Other(_)
        ));
    }

    #[test]
    fn test_gone_errors_map_to_not_found() {
        assert!(map_rusb_error(rusb::Error::NoDevice).is_gone());
        assert!(!map_rusb_error(rusb::Error::Timeout).is_gone());
    }
}
