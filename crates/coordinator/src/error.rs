//! Transition error types

use protocol::TransportError;
use thiserror::Error;

/// Why a reset-and-confirm cycle or a flow step did not produce a device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The controller was released while waiting
    #[error("Transition cancelled")]
    Cancelled,

    /// The device never reported leaving the bus
    #[error("Device did not detach after {attempts} attempts")]
    DetachTimeout { attempts: u32 },

    /// The device left but no matching device came back
    #[error("Device did not re-attach after {attempts} attempts")]
    AttachTimeout { attempts: u32 },

    /// Could not open the device
    #[error("Failed to open device: {0}")]
    Open(TransportError),

    /// Synchronous reset was rejected
    #[error("Device reset failed: {0}")]
    Reset(TransportError),

    /// Accessory handshake transfer failed
    #[error("Accessory handshake failed: {0}")]
    Handshake(TransportError),
}

impl TransitionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransitionError::Cancelled)
    }
}

/// Type alias for transition results
pub type Result<T> = std::result::Result<T, TransitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransitionError::DetachTimeout { attempts: 21 };
        assert!(err.to_string().contains("21 attempts"));

        let err = TransitionError::Handshake(TransportError::Timeout);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(TransitionError::Cancelled.is_cancelled());
        assert!(!TransitionError::AttachTimeout { attempts: 1 }.is_cancelled());
    }
}
