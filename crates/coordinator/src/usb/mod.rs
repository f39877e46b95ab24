//! libusb-backed collaborators
//!
//! [`RusbTransport`] opens devices and speaks the accessory protocol over
//! control transfers. [`HotplugMonitor`] runs the libusb event loop on its
//! own thread and forwards attach/detach notifications into the inbox.

pub mod device;
pub mod hotplug;
pub mod transport;

pub use device::{describe_device, map_rusb_error};
pub use hotplug::HotplugMonitor;
pub use transport::{RusbConnection, RusbTransport};
