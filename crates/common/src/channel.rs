//! Channels between the caller, the transition worker thread and the listener
//!
//! Commands flow from any caller thread to the single worker over an
//! unbounded queue, so enqueueing never blocks. Outcomes can flow back to an
//! async consumer through the outcome channel.

use async_channel::{Receiver, Sender, unbounded};
use protocol::{AoapSwitchRequest, DeviceInfo, TransitionOutcome};
use std::time::Duration;

/// Commands executed by the transition worker, in FIFO order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCommand {
    /// Reset a device and wait for it to come back
    ResetDevice {
        /// Device to reset
        device: DeviceInfo,
    },

    /// Switch a device into accessory mode
    StartAoap {
        /// Handshake request (includes the target device)
        request: AoapSwitchRequest,
    },
}

impl TransitionCommand {
    /// Device the command targets
    pub fn device(&self) -> &DeviceInfo {
        match self {
            TransitionCommand::ResetDevice { device } => device,
            TransitionCommand::StartAoap { request } => &request.device,
        }
    }
}

/// Enqueue side of the command queue (any thread, never blocks)
#[derive(Clone)]
pub struct CommandSender {
    cmd_tx: Sender<TransitionCommand>,
}

impl CommandSender {
    /// Enqueue a command
    ///
    /// Fails only when the queue has been closed.
    pub fn send(&self, cmd: TransitionCommand) -> crate::Result<()> {
        self.cmd_tx
            .try_send(cmd)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Close the queue; pending commands stay readable, new ones are refused
    pub fn close(&self) -> bool {
        self.cmd_tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

/// Worker side of the command queue (blocking)
pub struct CommandReceiver {
    cmd_rx: Receiver<TransitionCommand>,
}

impl CommandReceiver {
    /// Receive the next command, blocking until one arrives or the queue closes
    pub fn recv_command(&self) -> crate::Result<TransitionCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<TransitionCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Number of commands waiting
    pub fn pending(&self) -> usize {
        self.cmd_rx.len()
    }
}

/// Create the command queue
///
/// Returns (CommandSender for callers, CommandReceiver for the worker thread)
pub fn create_command_channel() -> (CommandSender, CommandReceiver) {
    let (cmd_tx, cmd_rx) = unbounded();
    (CommandSender { cmd_tx }, CommandReceiver { cmd_rx })
}

/// Producer side of the outcome channel, used from the worker thread
#[derive(Clone)]
pub struct OutcomeSender {
    outcome_tx: Sender<TransitionOutcome>,
}

impl OutcomeSender {
    pub fn send(&self, outcome: TransitionOutcome) -> crate::Result<()> {
        self.outcome_tx
            .try_send(outcome)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Consumer side of the outcome channel
#[derive(Clone)]
pub struct OutcomeReceiver {
    outcome_rx: Receiver<TransitionOutcome>,
}

impl OutcomeReceiver {
    /// Wait for the next outcome
    pub async fn recv(&self) -> crate::Result<TransitionOutcome> {
        self.outcome_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Wait for the next outcome, giving up after `timeout`
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<TransitionOutcome> {
        tokio::time::timeout(timeout, self.outcome_rx.recv())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    /// Wait for the next outcome from a non-async thread
    pub fn recv_blocking(&self) -> crate::Result<TransitionOutcome> {
        self.outcome_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Take an outcome if one is already available
    pub fn try_recv(&self) -> Option<TransitionOutcome> {
        self.outcome_rx.try_recv().ok()
    }
}

/// Create the outcome channel
pub fn create_outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    let (outcome_tx, outcome_rx) = unbounded();
    (OutcomeSender { outcome_tx }, OutcomeReceiver { outcome_rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo::new(1, 4, 0x18d1, 0x4ee2)
    }

    #[test]
    fn test_commands_are_fifo() {
        let (tx, rx) = create_command_channel();

        tx.send(TransitionCommand::ResetDevice { device: device() })
            .unwrap();
        tx.send(TransitionCommand::StartAoap {
            request: AoapSwitchRequest::new(device(), "Acme", "Unit"),
        })
        .unwrap();

        assert_eq!(rx.pending(), 2);
        assert!(matches!(
            rx.recv_command().unwrap(),
            TransitionCommand::ResetDevice { .. }
        ));
        assert!(matches!(
            rx.recv_command().unwrap(),
            TransitionCommand::StartAoap { .. }
        ));
        assert!(rx.try_recv_command().is_none());
    }

    #[test]
    fn test_closed_queue_refuses_commands() {
        let (tx, rx) = create_command_channel();
        tx.send(TransitionCommand::ResetDevice { device: device() })
            .unwrap();

        assert!(tx.close());
        assert!(tx.is_closed());
        assert!(
            tx.send(TransitionCommand::ResetDevice { device: device() })
                .is_err()
        );

        // Already queued command is still delivered, then the queue reports closed
        assert!(rx.recv_command().is_ok());
        assert!(rx.recv_command().is_err());
    }

    #[tokio::test]
    async fn test_outcome_channel() {
        let (tx, rx) = create_outcome_channel();

        std::thread::spawn(move || {
            tx.send(TransitionOutcome::ResetComplete(Some(device())))
                .unwrap();
        });

        let outcome = rx.recv_timeout(Duration::from_secs(5)).await;
        assert_eq!(outcome, Some(TransitionOutcome::ResetComplete(Some(device()))));
    }

    #[tokio::test]
    async fn test_outcome_recv_timeout_expires() {
        let (_tx, rx) = create_outcome_channel();
        let outcome = rx.recv_timeout(Duration::from_millis(20)).await;
        assert!(outcome.is_none());
    }
}
