//! Shared types for aoap-switch
//!
//! This crate defines the data exchanged between the transition coordinator,
//! its transport adapters and its callers: device descriptions that survive a
//! re-enumeration, the accessory identification request, the outcome of a
//! transition, and the Android Open Accessory (AOA) control request constants.
//!
//! # Example
//!
//! ```
//! use protocol::{AoapSwitchRequest, DeviceInfo, PortPath};
//!
//! let phone = DeviceInfo::new(1, 7, 0x18d1, 0x4ee2).with_port_path(PortPath::new(1, vec![2, 3]));
//! assert!(!phone.is_accessory_mode());
//!
//! let request = AoapSwitchRequest::new(phone, "Acme", "Head Unit")
//!     .with_description("Infotainment")
//!     .with_version("1.0");
//! assert_eq!(request.model, "Head Unit");
//! ```

pub mod aoap;
pub mod error;
pub mod types;
pub mod version;

pub use aoap::{AccessoryString, is_accessory_product};
pub use error::{Result, TransportError};
pub use types::{AoapSwitchRequest, DeviceInfo, PortPath, TransitionOutcome};
pub use version::AccessoryProtocolVersion;
