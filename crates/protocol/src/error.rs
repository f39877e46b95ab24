//! Transport error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a USB transport adapter
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    /// Device is no longer present on the bus
    #[error("Device not found")]
    NotFound,

    /// Insufficient permissions to open the device
    #[error("Permission denied")]
    Access,

    /// Device or resource busy
    #[error("Device busy")]
    Busy,

    /// Transfer did not complete in time
    #[error("Transfer timed out")]
    Timeout,

    /// Device rejected the request
    #[error("Request not supported by device")]
    NotSupported,

    /// Input/output failure on the bus
    #[error("I/O error: {0}")]
    Io(String),

    /// Anything else the backend reports
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// True when the error means the device has left the bus
    pub fn is_gone(&self) -> bool {
        matches!(self, TransportError::NotFound)
    }
}

/// Type alias for transport results
pub type Result<T> = std::result::Result<T, TransportError>;
