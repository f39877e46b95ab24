//! Device selectors
//!
//! Three forms are accepted on the command line:
//! - `1-2.3` port path (bus 1, root port 2, hub port 3)
//! - `1:7` bus and device address, decimal
//! - `0x18d1:0x4ee2` vendor and product ID, hex with `0x` prefix

use anyhow::{Result, anyhow};
use protocol::{DeviceInfo, PortPath};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    PortPath(PortPath),
    Address { bus: u8, address: u8 },
    VidPid { vendor_id: u16, product_id: u16 },
}

impl DeviceSelector {
    pub fn matches(&self, device: &DeviceInfo) -> bool {
        match self {
            DeviceSelector::PortPath(path) => device.port_path().as_ref() == Some(path),
            DeviceSelector::Address { bus, address } => {
                device.bus_number == *bus && device.device_address == *address
            }
            DeviceSelector::VidPid {
                vendor_id,
                product_id,
            } => device.vendor_id == *vendor_id && device.product_id == *product_id,
        }
    }

    /// Pick the single device this selector names
    pub fn select(&self, devices: &[DeviceInfo]) -> Result<DeviceInfo> {
        let mut matching = devices.iter().filter(|d| self.matches(d));

        let first = matching
            .next()
            .ok_or_else(|| anyhow!("No device matches '{}'", self))?;

        if matching.next().is_some() {
            return Err(anyhow!(
                "More than one device matches '{}', select by port path or bus:address",
                self
            ));
        }

        Ok(first.clone())
    }
}

fn parse_hex_id(id: &str, name: &str) -> Result<u16, String> {
    let hex = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| format!("Invalid {} '{}', must start with '0x'", name, id))?;

    if hex.is_empty() || hex.len() > 4 {
        return Err(format!("Invalid {} '{}', hex part must be 1-4 digits", name, id));
    }

    u16::from_str_radix(hex, 16).map_err(|_| format!("Invalid {} '{}', not a valid hex number", name, id))
}

impl FromStr for DeviceSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.contains('-') {
            return s.parse::<PortPath>().map(DeviceSelector::PortPath);
        }

        let (left, right) = s.split_once(':').ok_or_else(|| {
            format!(
                "Invalid device selector '{}', expected BUS-PORT[.PORT...], BUS:ADDR or 0xVID:0xPID",
                s
            )
        })?;

        if left.starts_with("0x") || left.starts_with("0X") {
            return Ok(DeviceSelector::VidPid {
                vendor_id: parse_hex_id(left, "VID")?,
                product_id: parse_hex_id(right, "PID")?,
            });
        }

        let bus = left
            .parse::<u8>()
            .map_err(|_| format!("Invalid bus number '{}'", left))?;
        let address = right
            .parse::<u8>()
            .map_err(|_| format!("Invalid device address '{}'", right))?;
        Ok(DeviceSelector::Address { bus, address })
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::PortPath(path) => write!(f, "{}", path),
            DeviceSelector::Address { bus, address } => write!(f, "{}:{}", bus, address),
            DeviceSelector::VidPid {
                vendor_id,
                product_id,
            } => write!(f, "{:#06x}:{:#06x}", vendor_id, product_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(address: u8, ports: Vec<u8>, vid: u16, pid: u16) -> DeviceInfo {
        DeviceInfo::new(1, address, vid, pid).with_port_path(PortPath::new(1, ports))
    }

    #[test]
    fn test_parse_port_path() {
        assert_eq!(
            "1-2.3".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::PortPath(PortPath::new(1, vec![2, 3]))
        );
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            "3:17".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::Address { bus: 3, address: 17 }
        );
    }

    #[test]
    fn test_parse_vid_pid() {
        assert_eq!(
            "0x18d1:0x4EE2".parse::<DeviceSelector>().unwrap(),
            DeviceSelector::VidPid {
                vendor_id: 0x18d1,
                product_id: 0x4ee2
            }
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<DeviceSelector>().is_err());
        assert!("usb0".parse::<DeviceSelector>().is_err());
        assert!("1-".parse::<DeviceSelector>().is_err());
        assert!("300:1".parse::<DeviceSelector>().is_err());
        assert!("0x18d1:4ee2".parse::<DeviceSelector>().is_err());
        assert!("0x12345:0x1".parse::<DeviceSelector>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["1-2.3", "2:9", "0x18d1:0x2d00"] {
            let selector: DeviceSelector = text.parse().unwrap();
            assert_eq!(selector.to_string(), text);
        }
    }

    #[test]
    fn test_select_unique_device() {
        let devices = vec![
            device(4, vec![1], 0x18d1, 0x4ee2),
            device(5, vec![2], 0x04e8, 0x6860),
        ];

        let selector: DeviceSelector = "0x04e8:0x6860".parse().unwrap();
        assert_eq!(selector.select(&devices).unwrap().device_address, 5);

        let selector: DeviceSelector = "1-1".parse().unwrap();
        assert_eq!(selector.select(&devices).unwrap().device_address, 4);
    }

    #[test]
    fn test_select_rejects_missing_and_ambiguous() {
        let devices = vec![
            device(4, vec![1], 0x18d1, 0x4ee2),
            device(5, vec![2], 0x18d1, 0x4ee2),
        ];

        let selector: DeviceSelector = "0x18d1:0x4ee2".parse().unwrap();
        assert!(selector.select(&devices).is_err());

        let selector: DeviceSelector = "1:9".parse().unwrap();
        assert!(selector.select(&devices).is_err());
    }
}
