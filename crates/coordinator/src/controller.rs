//! Controller facade
//!
//! Owns the event inbox, the cancellation token and the command queue, and
//! ties them to a transport, a bus-event source and a listener.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──init()──► Initialized ──release()──► Released
//!    └───────────────release()───────────────────────┘
//! ```
//!
//! The owner must call [`Controller::release`] on every exit path. A
//! controller dropped while still initialized logs an error and releases
//! itself.
//!
//! # Example
//!
//! ```
//! use coordinator::test_utils::{RecordingListener, SimulatedBus, test_timing};
//! use coordinator::Controller;
//! use common::test_utils::create_mock_phone;
//! use protocol::TransitionOutcome;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let bus = SimulatedBus::new();
//! let phone = create_mock_phone(1);
//! bus.plug(phone.clone());
//!
//! let listener = Arc::new(RecordingListener::default());
//! let mut controller = Controller::new(Arc::new(bus.clone()), Box::new(bus.clone()), listener.clone())
//!     .with_timing(test_timing());
//! controller.init()?;
//!
//! controller.start_device_reset(phone.clone());
//! let outcomes = listener.wait_for(1, Duration::from_secs(5));
//! assert_eq!(outcomes, vec![TransitionOutcome::ResetComplete(Some(phone))]);
//!
//! controller.release();
//! # Ok::<(), common::Error>(())
//! ```

use crate::cancel::CancellationToken;
use crate::config::TransitionTiming;
use crate::engine::TransitionEngine;
use crate::identity::{DeviceMatcher, PortPathMatcher};
use crate::inbox::EventInbox;
use crate::listener::TransitionListener;
use crate::queue::{CommandQueue, WorkerStats};
use crate::transport::{BusEventSource, Transport};
use common::TransitionCommand;
use protocol::{AoapSwitchRequest, DeviceInfo};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Created,
    Initialized,
    Released,
}

pub struct Controller<T: Transport> {
    transport: Arc<T>,
    events: Box<dyn BusEventSource>,
    listener: Arc<dyn TransitionListener>,
    matcher: Arc<dyn DeviceMatcher>,
    timing: TransitionTiming,
    inbox: Arc<EventInbox>,
    cancel: CancellationToken,
    queue: CommandQueue,
    state: ControllerState,
}

impl<T: Transport> Controller<T> {
    /// Create a controller with the port-path matching policy and default timing
    pub fn new(
        transport: Arc<T>,
        events: Box<dyn BusEventSource>,
        listener: Arc<dyn TransitionListener>,
    ) -> Self {
        Self {
            transport,
            events,
            listener,
            matcher: Arc::new(PortPathMatcher::new()),
            timing: TransitionTiming::default(),
            inbox: Arc::new(EventInbox::new()),
            cancel: CancellationToken::new(),
            queue: CommandQueue::new(),
            state: ControllerState::Created,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn DeviceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_timing(mut self, timing: TransitionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Subscribe to bus events and start the worker thread
    pub fn init(&mut self) -> common::Result<()> {
        match self.state {
            ControllerState::Created => {}
            ControllerState::Initialized => {
                return Err(common::Error::Lifecycle(
                    "Controller already initialized".to_string(),
                ));
            }
            ControllerState::Released => {
                return Err(common::Error::Lifecycle(
                    "Controller already released".to_string(),
                ));
            }
        }

        self.timing.validate()?;
        self.events.subscribe(self.inbox.clone())?;

        let engine = TransitionEngine::new(
            self.transport.clone(),
            self.matcher.clone(),
            self.inbox.clone(),
            self.cancel.clone(),
            self.timing,
        );

        if let Err(e) = self
            .queue
            .start(engine, self.listener.clone(), self.cancel.clone())
        {
            self.events.unsubscribe();
            return Err(e);
        }

        self.state = ControllerState::Initialized;
        info!(
            "Controller initialized (detach {}x{}ms, attach {}x{}ms)",
            self.timing.detach_attempts,
            self.timing.detach_wait_ms,
            self.timing.attach_attempts,
            self.timing.attach_wait_ms
        );
        Ok(())
    }

    /// Unsubscribe, cancel in-flight waits and stop the worker
    ///
    /// Safe to call more than once. A command interrupted here produces no
    /// outcome, and queued commands are discarded.
    pub fn release(&mut self) {
        match self.state {
            ControllerState::Released => {
                debug!("Controller already released");
                return;
            }
            ControllerState::Initialized => self.events.unsubscribe(),
            ControllerState::Created => {}
        }

        self.inbox.cancel_waiters(&self.cancel);
        self.queue.stop();
        self.state = ControllerState::Released;
        info!("Controller released");
    }

    /// Queue a device reset; returns immediately
    pub fn start_device_reset(&self, device: DeviceInfo) {
        debug!("Queueing reset for {}", device);
        self.enqueue(TransitionCommand::ResetDevice { device });
    }

    /// Queue an accessory switch; returns immediately
    pub fn start_aoap(&self, request: AoapSwitchRequest) {
        debug!("Queueing accessory start for {}", request.device);
        self.enqueue(TransitionCommand::StartAoap { request });
    }

    fn enqueue(&self, cmd: TransitionCommand) {
        if self.state == ControllerState::Released {
            warn!("Controller released, ignoring command for {}", cmd.device());
            return;
        }
        self.queue.enqueue(cmd);
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn timing(&self) -> &TransitionTiming {
        &self.timing
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.queue.stats()
    }
}

impl<T: Transport> Drop for Controller<T> {
    fn drop(&mut self) {
        if self.state == ControllerState::Initialized {
            error!("Controller dropped without release(), releasing now");
            self.release();
        }
    }
}
