//! Accessory-mode transition coordinator
//!
//! Serializes USB mode transitions for attached devices. Callers submit
//! "reset this device" or "switch this device into accessory mode" commands;
//! a single worker thread drives each one through a port reset, waits for the
//! device to leave and re-join the bus, and reports where it ended up.
//!
//! # Architecture
//!
//! ```text
//! caller ──start_*()──► CommandQueue ──► aoap-worker thread
//!                                          │  TransitionEngine
//!                                          │    ├─ Transport (open/reset/handshake)
//!                                          │    └─ EventInbox ◄── BusEventSource thread
//!                                          ▼
//!                                   TransitionListener
//! ```
//!
//! The [`Controller`] owns all of it and must be released by its owner.

pub mod cancel;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod identity;
pub mod inbox;
pub mod listener;
pub mod queue;
pub mod test_utils;
pub mod transport;
pub mod usb;

pub use cancel::CancellationToken;
pub use config::TransitionTiming;
pub use controller::{Controller, ControllerState};
pub use engine::TransitionEngine;
pub use error::{Result, TransitionError};
pub use identity::{DeviceMatcher, PortPathMatcher};
pub use inbox::EventInbox;
pub use listener::{ChannelListener, TransitionListener};
pub use queue::{CommandQueue, WorkerStats};
pub use transport::{BusEventSource, Connection, Transport};
pub use usb::{HotplugMonitor, RusbConnection, RusbTransport};
