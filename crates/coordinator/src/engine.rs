//! Transition engine
//!
//! Drives a device through a bus reset or an accessory switch and waits for it
//! to re-enumerate. Everything here runs on the worker thread; the only
//! blocking points are transport calls and bounded [`EventInbox`] waits.
//!
//! # Reset-and-confirm cycle
//!
//! ```text
//!  Phase A: await detach                 Phase B: await attach
//!  ─────────────────────                 ─────────────────────
//!  ┌─► open(original) ── fails ──► done  ┌─► await_event(wait)
//!  │     │ ok                            │     │
//!  │   reset + close                     │   cancelled? ──► abort
//!  │     │                               │     │
//!  │   await_event(wait)                 │   matching attach? ──► new handle
//!  │     │                               │     │ no
//!  │   cancelled? ──► abort              └── attempts left
//!  │     │
//!  │   matching removal? ──► done
//!  │     │ no
//!  └── attempts left
//! ```

use crate::cancel::CancellationToken;
use crate::config::TransitionTiming;
use crate::error::{Result, TransitionError};
use crate::identity::DeviceMatcher;
use crate::inbox::EventInbox;
use crate::transport::{Connection, Transport};
use protocol::{AoapSwitchRequest, DeviceInfo, TransitionOutcome};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct TransitionEngine<T: Transport> {
    transport: Arc<T>,
    matcher: Arc<dyn DeviceMatcher>,
    inbox: Arc<EventInbox>,
    cancel: CancellationToken,
    timing: TransitionTiming,
}

impl<T: Transport> TransitionEngine<T> {
    pub fn new(
        transport: Arc<T>,
        matcher: Arc<dyn DeviceMatcher>,
        inbox: Arc<EventInbox>,
        cancel: CancellationToken,
        timing: TransitionTiming,
    ) -> Self {
        Self {
            transport,
            matcher,
            inbox,
            cancel,
            timing,
        }
    }

    pub fn timing(&self) -> &TransitionTiming {
        &self.timing
    }

    /// Reset `device` and report where it ended up
    ///
    /// Returns `None` only when the controller was released mid-flight; the
    /// command is then dropped without an outcome.
    pub fn handle_device_reset(&self, device: &DeviceInfo) -> Option<TransitionOutcome> {
        debug!("Handling device reset: {}", device);
        self.inbox.reset_queues();

        let completed = if self.transport.is_accessory_mode(device) {
            match self.reset_and_confirm(device) {
                Ok(new_device) => Some(new_device),
                Err(e) if e.is_cancelled() => {
                    debug!("Reset of {} cancelled", device);
                    return None;
                }
                Err(e) => {
                    warn!("Reset of accessory {} failed: {}", device, e);
                    None
                }
            }
        } else {
            // Not an accessory: a plain reset brings it back in the same mode
            match self.reset_in_place(device) {
                Ok(()) => Some(device.clone()),
                Err(e) => {
                    error!("Reset of {} failed: {}", device, e);
                    None
                }
            }
        };

        if let Some(new_device) = &completed {
            info!("Reset complete: {}", new_device);
        }
        Some(TransitionOutcome::ResetComplete(completed))
    }

    /// Switch the device named in `request` into accessory mode
    ///
    /// Returns `None` only when the controller was released mid-flight.
    pub fn handle_aoap_start(&self, request: &AoapSwitchRequest) -> Option<TransitionOutcome> {
        debug!("Handling accessory start: {}", request.device);
        let mut device = request.device.clone();
        self.inbox.reset_queues();

        if self.transport.is_accessory_mode(&device) {
            debug!("{} is already an accessory, cycling it first", device);
            match self.reset_and_confirm(&device) {
                Ok(new_device) => device = new_device,
                Err(e) if e.is_cancelled() => return None,
                Err(e) => {
                    warn!("Could not cycle {} out of accessory mode: {}", device, e);
                    return Some(TransitionOutcome::AoapStartComplete(None));
                }
            }
        }

        self.inbox.reset_queues();

        // Held until the flow ends; dropping it on any early return closes it too
        let connection = match self.transport.open(&device) {
            Ok(mut connection) => {
                if let Err(e) = Self::send_handshake(&mut connection, request) {
                    warn!("Failed to switch {} into accessory mode: {}", device, e);
                }
                Some(connection)
            }
            Err(e) => {
                warn!(
                    "Failed to switch {} into accessory mode: {}",
                    device,
                    TransitionError::Open(e)
                );
                None
            }
        };

        let outcome = match self.reset_and_confirm(&device) {
            Err(e) if e.is_cancelled() => {
                debug!("Accessory start for {} cancelled", device);
                None
            }
            Err(e) => {
                warn!("{} did not come back after the handshake: {}", device, e);
                Some(TransitionOutcome::AoapStartComplete(None))
            }
            Ok(new_device) if self.transport.is_accessory_mode(&new_device) => {
                info!("Accessory mode started: {}", new_device);
                Some(TransitionOutcome::AoapStartComplete(Some(new_device)))
            }
            Ok(new_device) => {
                warn!("Device not in accessory mode after switching: {}", new_device);
                Some(TransitionOutcome::AoapStartFailed(new_device))
            }
        };

        if let Some(connection) = connection {
            connection.close();
        }
        outcome
    }

    /// Reset `device`, wait for it to leave the bus, then wait for it to come back
    ///
    /// The returned handle always comes from an attach notification.
    pub fn reset_and_confirm(&self, device: &DeviceInfo) -> Result<DeviceInfo> {
        debug!("Reset and confirm mode change: {}", device);
        self.await_detach(device)?;
        self.await_attach(device)
    }

    fn await_detach(&self, device: &DeviceInfo) -> Result<()> {
        let wait = self.timing.detach_wait();

        for attempt in 1..=self.timing.detach_attempts {
            match self.transport.open(device) {
                Err(e) => {
                    debug!("{} cannot be opened ({}), treating as removed", device, e);
                    return Ok(());
                }
                Ok(mut connection) => {
                    if let Err(e) = connection.reset() {
                        debug!("Reset attempt {} on {} failed: {}", attempt, device, e);
                    }
                    connection.close();
                }
            }

            self.inbox.await_event(wait, &self.cancel);
            if self.cancel.is_cancelled() {
                return Err(TransitionError::Cancelled);
            }

            if self
                .inbox
                .take_matching_removal(device, self.matcher.as_ref())
            {
                debug!("Detach of {} observed after {} attempt(s)", device, attempt);
                return Ok(());
            }
        }

        warn!("Device still in the same mode after reset: {}", device);
        Err(TransitionError::DetachTimeout {
            attempts: self.timing.detach_attempts,
        })
    }

    fn await_attach(&self, device: &DeviceInfo) -> Result<DeviceInfo> {
        let wait = self.timing.attach_wait();

        for attempt in 1..=self.timing.attach_attempts {
            self.inbox.await_event(wait, &self.cancel);
            if self.cancel.is_cancelled() {
                return Err(TransitionError::Cancelled);
            }

            if let Some(attached) = self
                .inbox
                .take_matching_attachment(device, self.matcher.as_ref())
            {
                debug!(
                    "{} re-attached as {} after {} attempt(s)",
                    device, attached, attempt
                );
                return Ok(attached);
            }
        }

        warn!("Device disconnected and did not come back: {}", device);
        Err(TransitionError::AttachTimeout {
            attempts: self.timing.attach_attempts,
        })
    }

    fn reset_in_place(&self, device: &DeviceInfo) -> Result<()> {
        let mut connection = self.transport.open(device).map_err(TransitionError::Open)?;
        let result = connection.reset().map_err(TransitionError::Reset);
        connection.close();
        result
    }

    fn send_handshake(connection: &mut T::Connection, request: &AoapSwitchRequest) -> Result<()> {
        for (id, value) in request.identification_strings() {
            connection
                .send_identification_string(id, value)
                .map_err(TransitionError::Handshake)?;
        }
        connection
            .send_start_accessory_mode()
            .map_err(TransitionError::Handshake)
    }
}
