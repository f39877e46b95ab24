//! libusb transport
//!
//! Devices are located by bus number and address, which is exactly what goes
//! stale on re-enumeration: once a device has left the bus, `open` on its old
//! [`DeviceInfo`] fails with [`TransportError::NotFound`].

use super::device::{describe_device, describe_device_with_serial, map_rusb_error};
use crate::transport::{Connection, Transport};
use protocol::aoap::{
    ACCESSORY_GET_PROTOCOL, ACCESSORY_SEND_STRING, ACCESSORY_START, REQUEST_TYPE_VENDOR_IN,
    REQUEST_TYPE_VENDOR_OUT,
};
use protocol::{AccessoryProtocolVersion, AccessoryString, DeviceInfo, TransportError};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for accessory control transfers
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

pub struct RusbTransport {
    context: Context,
    timeout: Duration,
}

impl RusbTransport {
    pub fn new() -> common::Result<Self> {
        let context = Context::new()
            .map_err(|e| common::Error::Usb(format!("Failed to create USB context: {}", e)))?;
        Ok(Self::with_context(context))
    }

    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            timeout: CONTROL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shared libusb context, for wiring up a [`super::HotplugMonitor`]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Enumerate every device currently on the bus
    pub fn list_devices(&self) -> common::Result<Vec<DeviceInfo>> {
        let devices = self
            .context
            .devices()
            .map_err(|e| common::Error::Usb(format!("Failed to enumerate devices: {}", e)))?;

        let mut infos = Vec::new();
        for device in devices.iter() {
            match describe_device_with_serial(&device) {
                Ok(info) => infos.push(info),
                Err(e) => warn!(
                    "Skipping device bus={} addr={}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                ),
            }
        }

        debug!("Enumerated {} devices", infos.len());
        Ok(infos)
    }

    /// Ask a device which accessory protocol version it implements
    pub fn accessory_protocol_version(
        &self,
        device: &DeviceInfo,
    ) -> Result<AccessoryProtocolVersion, TransportError> {
        let connection = self.open(device)?;
        connection.protocol_version()
    }

    fn find_device(&self, info: &DeviceInfo) -> Result<Device<Context>, TransportError> {
        let devices = self.context.devices().map_err(map_rusb_error)?;

        devices
            .iter()
            .find(|d| d.bus_number() == info.bus_number && d.address() == info.device_address)
            .ok_or(TransportError::NotFound)
    }
}

impl Transport for RusbTransport {
    type Connection = RusbConnection;

    fn open(&self, device: &DeviceInfo) -> Result<Self::Connection, TransportError> {
        let usb_device = self.find_device(device)?;
        let handle = usb_device.open().map_err(map_rusb_error)?;

        // Refresh from the live descriptor so logs show what is actually open
        let info = describe_device(&usb_device).unwrap_or_else(|_| device.clone());
        debug!("Opened {}", info);

        Ok(RusbConnection {
            handle,
            device: info,
            timeout: self.timeout,
        })
    }
}

/// Open handle to a device, closed on drop
pub struct RusbConnection {
    handle: DeviceHandle<Context>,
    device: DeviceInfo,
    timeout: Duration,
}

impl RusbConnection {
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Issue GET_PROTOCOL
    pub fn protocol_version(&self) -> Result<AccessoryProtocolVersion, TransportError> {
        let mut buffer = [0u8; 2];
        let len = self
            .handle
            .read_control(
                REQUEST_TYPE_VENDOR_IN,
                ACCESSORY_GET_PROTOCOL,
                0,
                0,
                &mut buffer,
                self.timeout,
            )
            .map_err(map_rusb_error)?;

        Ok(AccessoryProtocolVersion::from_bytes(&buffer[..len]))
    }

    fn vendor_out(&self, request: u8, index: u16, data: &[u8]) -> Result<(), TransportError> {
        let written = self
            .handle
            .write_control(REQUEST_TYPE_VENDOR_OUT, request, 0, index, data, self.timeout)
            .map_err(map_rusb_error)?;

        if written != data.len() {
            return Err(TransportError::Io(format!(
                "Short control write: {} of {} bytes",
                written,
                data.len()
            )));
        }
        Ok(())
    }
}

impl Connection for RusbConnection {
    fn reset(&mut self) -> Result<(), TransportError> {
        debug!("Resetting {}", self.device);
        self.handle.reset().map_err(map_rusb_error)
    }

    fn send_identification_string(
        &mut self,
        id: AccessoryString,
        value: &str,
    ) -> Result<(), TransportError> {
        debug!("Sending {} = {:?} to {}", id, value, self.device);
        self.vendor_out(ACCESSORY_SEND_STRING, id.index(), &AccessoryString::encode(value))
    }

    fn send_start_accessory_mode(&mut self) -> Result<(), TransportError> {
        debug!("Sending START to {}", self.device);
        self.vendor_out(ACCESSORY_START, 0, &[])
    }
}

impl Drop for RusbConnection {
    fn drop(&mut self) {
        debug!("Closed {}", self.device);
    }
}
