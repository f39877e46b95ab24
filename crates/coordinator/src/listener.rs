//! Outcome listener
//!
//! Callbacks run on the worker thread, once per accepted command that reaches
//! a terminal outcome. A command dropped by cancellation gets no callback.

use common::OutcomeSender;
use protocol::{DeviceInfo, TransitionOutcome};
use tracing::warn;

pub trait TransitionListener: Send + Sync {
    /// Reset finished; `None` if the device could not be reset or did not come back
    fn on_device_reset_complete(&self, device: Option<DeviceInfo>);

    /// Accessory switch finished; `None` if the device could not be cycled
    fn on_aoap_start_complete(&self, device: Option<DeviceInfo>);

    /// Device came back after the handshake but is not presenting as an accessory
    fn on_aoap_start_failed(&self, device: DeviceInfo);
}

/// Invoke the callback matching `outcome`
pub fn deliver(listener: &dyn TransitionListener, outcome: TransitionOutcome) {
    match outcome {
        TransitionOutcome::ResetComplete(device) => listener.on_device_reset_complete(device),
        TransitionOutcome::AoapStartComplete(device) => listener.on_aoap_start_complete(device),
        TransitionOutcome::AoapStartFailed(device) => listener.on_aoap_start_failed(device),
    }
}

/// Listener that forwards every outcome into an outcome channel
pub struct ChannelListener {
    sender: OutcomeSender,
}

impl ChannelListener {
    pub fn new(sender: OutcomeSender) -> Self {
        Self { sender }
    }

    fn forward(&self, outcome: TransitionOutcome) {
        if let Err(e) = self.sender.send(outcome) {
            warn!("Dropping transition outcome, receiver is gone: {}", e);
        }
    }
}

impl TransitionListener for ChannelListener {
    fn on_device_reset_complete(&self, device: Option<DeviceInfo>) {
        self.forward(TransitionOutcome::ResetComplete(device));
    }

    fn on_aoap_start_complete(&self, device: Option<DeviceInfo>) {
        self.forward(TransitionOutcome::AoapStartComplete(device));
    }

    fn on_aoap_start_failed(&self, device: DeviceInfo) {
        self.forward(TransitionOutcome::AoapStartFailed(device));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::create_outcome_channel;

    #[test]
    fn test_channel_listener_forwards_each_callback() {
        let (tx, rx) = create_outcome_channel();
        let listener = ChannelListener::new(tx);
        let device = DeviceInfo::new(1, 2, 0x18d1, 0x2d00);

        deliver(&listener, TransitionOutcome::ResetComplete(None));
        deliver(
            &listener,
            TransitionOutcome::AoapStartComplete(Some(device.clone())),
        );
        deliver(&listener, TransitionOutcome::AoapStartFailed(device.clone()));

        assert_eq!(rx.try_recv(), Some(TransitionOutcome::ResetComplete(None)));
        assert_eq!(
            rx.try_recv(),
            Some(TransitionOutcome::AoapStartComplete(Some(device.clone())))
        );
        assert_eq!(rx.try_recv(), Some(TransitionOutcome::AoapStartFailed(device)));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_channel_listener_survives_dropped_receiver() {
        let (tx, rx) = create_outcome_channel();
        drop(rx);
        let listener = ChannelListener::new(tx);
        listener.on_device_reset_complete(None);
    }
}
