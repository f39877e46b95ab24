//! Device and transition type definitions
//!
//! A [`DeviceInfo`] is a snapshot of how the OS currently sees a device. It is
//! not stable across a mode switch: the device address always changes on
//! re-enumeration, and an accessory switch also changes vendor/product IDs.
//! The port path is what usually survives, which is why it is carried here.

use crate::aoap::is_accessory_product;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical attachment point of a device: bus number plus hub port chain
///
/// Formatted the way Linux sysfs names devices, e.g. `1-2.3` for bus 1,
/// root port 2, hub port 3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortPath {
    pub bus: u8,
    pub ports: Vec<u8>,
}

impl PortPath {
    pub fn new(bus: u8, ports: Vec<u8>) -> Self {
        Self { bus, ports }
    }
}

impl fmt::Display for PortPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.bus)?;
        for (i, port) in self.ports.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for PortPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bus, ports) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid port path '{}', expected BUS-PORT[.PORT...]", s))?;

        let bus: u8 = bus
            .parse()
            .map_err(|_| format!("Invalid bus number in port path '{}'", s))?;

        let ports = ports
            .split('.')
            .map(|p| {
                p.parse::<u8>()
                    .map_err(|_| format!("Invalid port number '{}' in port path '{}'", p, s))
            })
            .collect::<Result<Vec<u8>, String>>()?;

        Ok(PortPath { bus, ports })
    }
}

/// A USB device as currently enumerated by the OS
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Bus number
    pub bus_number: u8,
    /// Device address on the bus (reassigned on every enumeration)
    pub device_address: u8,
    /// Hub port chain from the root port, empty when the backend cannot tell
    #[serde(default)]
    pub port_numbers: Vec<u8>,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Serial number string (if it could be read)
    #[serde(default)]
    pub serial_number: Option<String>,
}

impl DeviceInfo {
    pub fn new(bus_number: u8, device_address: u8, vendor_id: u16, product_id: u16) -> Self {
        Self {
            bus_number,
            device_address,
            port_numbers: Vec::new(),
            vendor_id,
            product_id,
            serial_number: None,
        }
    }

    pub fn with_port_path(mut self, path: PortPath) -> Self {
        self.bus_number = path.bus;
        self.port_numbers = path.ports;
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Physical attachment point, if the backend reported one
    pub fn port_path(&self) -> Option<PortPath> {
        if self.port_numbers.is_empty() {
            None
        } else {
            Some(PortPath::new(self.bus_number, self.port_numbers.clone()))
        }
    }

    /// Whether the VID/PID pair is one of the accessory-mode identities
    pub fn is_accessory_mode(&self) -> bool {
        is_accessory_product(self.vendor_id, self.product_id)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} bus {} addr {}",
            self.vendor_id, self.product_id, self.bus_number, self.device_address
        )?;
        if let Some(path) = self.port_path() {
            write!(f, " port {}", path)?;
        }
        if let Some(serial) = &self.serial_number {
            write!(f, " serial {}", serial)?;
        }
        Ok(())
    }
}

/// Request to switch a device into accessory mode
///
/// Carries the identification strings announced to the device during the
/// handshake. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoapSwitchRequest {
    pub device: DeviceInfo,
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
    pub uri: String,
    pub serial: String,
}

impl AoapSwitchRequest {
    pub fn new(
        device: DeviceInfo,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            device,
            manufacturer: manufacturer.into(),
            model: model.into(),
            description: String::new(),
            version: String::new(),
            uri: String::new(),
            serial: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Identification strings in handshake order
    pub fn identification_strings(&self) -> [(crate::AccessoryString, &str); 6] {
        use crate::AccessoryString;
        [
            (AccessoryString::Manufacturer, self.manufacturer.as_str()),
            (AccessoryString::Model, self.model.as_str()),
            (AccessoryString::Description, self.description.as_str()),
            (AccessoryString::Version, self.version.as_str()),
            (AccessoryString::Uri, self.uri.as_str()),
            (AccessoryString::Serial, self.serial.as_str()),
        ]
    }
}

/// Terminal result of one accepted command
///
/// `None` means the device could not be observed coming back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    /// Reset finished; carries the device as it re-enumerated
    ResetComplete(Option<DeviceInfo>),
    /// Accessory switch finished with the device presenting as an accessory
    AoapStartComplete(Option<DeviceInfo>),
    /// Device came back but the handshake did not take effect
    AoapStartFailed(DeviceInfo),
}

impl TransitionOutcome {
    /// Device reported by the outcome, if any
    pub fn device(&self) -> Option<&DeviceInfo> {
        match self {
            TransitionOutcome::ResetComplete(device)
            | TransitionOutcome::AoapStartComplete(device) => device.as_ref(),
            TransitionOutcome::AoapStartFailed(device) => Some(device),
        }
    }

    /// True when the requested transition took effect
    pub fn is_success(&self) -> bool {
        match self {
            TransitionOutcome::ResetComplete(device)
            | TransitionOutcome::AoapStartComplete(device) => device.is_some(),
            TransitionOutcome::AoapStartFailed(_) => false,
        }
    }
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionOutcome::ResetComplete(Some(device)) => {
                write!(f, "reset complete: {}", device)
            }
            TransitionOutcome::ResetComplete(None) => f.write_str("reset failed"),
            TransitionOutcome::AoapStartComplete(Some(device)) => {
                write!(f, "accessory mode started: {}", device)
            }
            TransitionOutcome::AoapStartComplete(None) => {
                f.write_str("accessory switch failed: device did not re-enumerate")
            }
            TransitionOutcome::AoapStartFailed(device) => {
                write!(f, "accessory handshake did not take effect: {}", device)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_path_display() {
        assert_eq!(PortPath::new(1, vec![2, 3]).to_string(), "1-2.3");
        assert_eq!(PortPath::new(3, vec![1]).to_string(), "3-1");
    }

    #[test]
    fn test_port_path_parse() {
        assert_eq!("1-2.3".parse::<PortPath>(), Ok(PortPath::new(1, vec![2, 3])));
        assert_eq!("2-4".parse::<PortPath>(), Ok(PortPath::new(2, vec![4])));

        assert!("1".parse::<PortPath>().is_err());
        assert!("x-1".parse::<PortPath>().is_err());
        assert!("1-2..3".parse::<PortPath>().is_err());
        assert!("1-".parse::<PortPath>().is_err());
    }

    #[test]
    fn test_port_path_absent_without_ports() {
        let device = DeviceInfo::new(1, 5, 0x1234, 0x5678);
        assert_eq!(device.port_path(), None);

        let device = device.with_port_path(PortPath::new(2, vec![1, 4]));
        assert_eq!(device.bus_number, 2);
        assert_eq!(device.port_path(), Some(PortPath::new(2, vec![1, 4])));
    }

    #[test]
    fn test_accessory_mode_detection() {
        assert!(DeviceInfo::new(1, 9, 0x18d1, 0x2d01).is_accessory_mode());
        assert!(!DeviceInfo::new(1, 9, 0x18d1, 0x4ee2).is_accessory_mode());
    }

    #[test]
    fn test_identification_strings_order() {
        let request = AoapSwitchRequest::new(DeviceInfo::new(1, 2, 3, 4), "m", "o")
            .with_description("d")
            .with_version("v")
            .with_uri("u")
            .with_serial("s");

        let values: Vec<&str> = request
            .identification_strings()
            .iter()
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(values, vec!["m", "o", "d", "v", "u", "s"]);
    }

    #[test]
    fn test_outcome_success() {
        let device = DeviceInfo::new(1, 2, 0x18d1, 0x2d00);
        assert!(TransitionOutcome::ResetComplete(Some(device.clone())).is_success());
        assert!(!TransitionOutcome::ResetComplete(None).is_success());
        assert!(!TransitionOutcome::AoapStartFailed(device.clone()).is_success());
        assert_eq!(
            TransitionOutcome::AoapStartFailed(device.clone()).device(),
            Some(&device)
        );
    }
}
