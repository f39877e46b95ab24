//! Collaborator interfaces: USB transport and bus-event source
//!
//! The engine never touches a USB library directly. It opens connections,
//! resets devices and sends the accessory handshake through [`Transport`], and
//! learns about attach/detach through whatever [`BusEventSource`] feeds the
//! [`EventInbox`]. The `usb` module provides libusb-backed implementations;
//! `test_utils` provides scripted ones.

use crate::inbox::EventInbox;
use protocol::{AccessoryString, DeviceInfo, TransportError};
use std::sync::Arc;

/// Opens connections to devices and answers capability queries
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a connection to `device`
    ///
    /// Failure to open is how a device that already left the bus shows up.
    fn open(&self, device: &DeviceInfo) -> Result<Self::Connection, TransportError>;

    /// Whether `device` currently presents as an accessory
    fn is_accessory_mode(&self, device: &DeviceInfo) -> bool {
        device.is_accessory_mode()
    }
}

/// An open device connection
///
/// Dropping the connection closes it; [`Connection::close`] makes the point
/// of release explicit in straight-line code.
pub trait Connection: Send {
    /// Issue a USB port reset
    ///
    /// Success does not mean the device has re-enumerated yet.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Send one accessory identification string
    fn send_identification_string(
        &mut self,
        id: AccessoryString,
        value: &str,
    ) -> Result<(), TransportError>;

    /// Ask the device to switch into accessory mode
    fn send_start_accessory_mode(&mut self) -> Result<(), TransportError>;

    /// Close the connection
    fn close(self)
    where
        Self: Sized,
    {
        drop(self)
    }
}

/// Delivers attach/detach notifications into an [`EventInbox`]
///
/// Notifications arrive on the source's own thread and must only append to
/// the inbox; they never block on engine state.
pub trait BusEventSource: Send {
    /// Start forwarding events into `inbox`
    fn subscribe(&mut self, inbox: Arc<EventInbox>) -> common::Result<()>;

    /// Stop forwarding events; must be safe to call when not subscribed
    fn unsubscribe(&mut self);
}
