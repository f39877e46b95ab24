//! Test utilities for the transition coordinator
//!
//! [`SimulatedBus`] stands in for both the USB transport and the bus-event
//! source. Devices on it react to resets and accessory handshakes the way
//! real hardware does: they leave the bus and come back under a new address,
//! with notifications delivered from a separate thread.

use crate::config::TransitionTiming;
use crate::inbox::EventInbox;
use crate::listener::TransitionListener;
use crate::transport::{BusEventSource, Connection, Transport};
use protocol::aoap::ACCESSORY_VENDOR_ID;
use protocol::{AccessoryString, DeviceInfo, TransitionOutcome, TransportError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Short timing for tests: 10 attempts of 50ms per phase
pub fn test_timing() -> TransitionTiming {
    TransitionTiming::uniform(10, Duration::from_millis(50))
}

/// What a simulated device does after a port reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetBehavior {
    /// Leave and come back with the same identity
    Reenumerate,
    /// Leave and come back with different IDs
    ReenumerateAs { vendor_id: u16, product_id: u16 },
    /// Stay on the bus, never re-enumerate
    Ignore,
    /// Leave and never come back
    Vanish,
}

/// What a simulated device does after START
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    /// Come back as an accessory (0x18d1:0x2d00)
    SwitchToAccessory,
    /// Come back unchanged
    Reenumerate,
    /// Stay on the bus, never re-enumerate
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBehavior {
    pub on_reset: ResetBehavior,
    pub on_start: StartBehavior,
    pub fail_open: bool,
    pub fail_reset: bool,
    /// Fail the handshake when this string is sent
    pub fail_string: Option<AccessoryString>,
}

impl Default for DeviceBehavior {
    fn default() -> Self {
        Self {
            on_reset: ResetBehavior::Reenumerate,
            on_start: StartBehavior::SwitchToAccessory,
            fail_open: false,
            fail_reset: false,
            fail_string: None,
        }
    }
}

/// Calls made through the simulated transport, keyed by device address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Open(u8),
    Reset(u8),
    SendString(u8, AccessoryString, String),
    Start(u8),
    Close(u8),
}

struct SimDevice {
    info: DeviceInfo,
    behavior: DeviceBehavior,
    leaving: bool,
}

struct BusState {
    devices: Vec<SimDevice>,
    inbox: Option<Arc<EventInbox>>,
    calls: Vec<TransportCall>,
    open_connections: usize,
    next_address: u8,
    detach_delay: Duration,
    attach_delay: Duration,
    unsubscribes: usize,
}

#[derive(Clone)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                devices: Vec::new(),
                inbox: None,
                calls: Vec::new(),
                open_connections: 0,
                next_address: 100,
                detach_delay: Duration::from_millis(5),
                attach_delay: Duration::from_millis(15),
                unsubscribes: 0,
            })),
        }
    }

    /// Delay before the detach notification, and between detach and attach
    pub fn with_delays(self, detach: Duration, attach: Duration) -> Self {
        {
            let mut state = self.lock();
            state.detach_delay = detach;
            state.attach_delay = attach;
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a device with default behavior, without a notification
    pub fn plug(&self, device: DeviceInfo) {
        self.plug_with(device, DeviceBehavior::default());
    }

    pub fn plug_with(&self, device: DeviceInfo, behavior: DeviceBehavior) {
        self.lock().devices.push(SimDevice {
            info: device,
            behavior,
            leaving: false,
        });
    }

    /// Add a device and notify subscribers
    pub fn hotplug(&self, device: DeviceInfo) {
        self.plug(device.clone());
        self.emit_attached(device);
    }

    /// Remove a device and notify subscribers
    pub fn unplug(&self, device: &DeviceInfo) {
        let removed = {
            let mut state = self.lock();
            let index = state.devices.iter().position(|d| same_slot(&d.info, device));
            index.map(|i| state.devices.remove(i).info)
        };
        if let Some(info) = removed {
            self.emit_detached(info);
        }
    }

    /// Deliver an attach notification without changing the bus
    pub fn emit_attached(&self, device: DeviceInfo) {
        let inbox = self.lock().inbox.clone();
        if let Some(inbox) = inbox {
            inbox.record_attached(device);
        }
    }

    /// Deliver a detach notification without changing the bus
    pub fn emit_detached(&self, device: DeviceInfo) {
        let inbox = self.lock().inbox.clone();
        if let Some(inbox) = inbox {
            inbox.record_detached(device);
        }
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.lock().devices.iter().map(|d| d.info.clone()).collect()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    pub fn resets(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Reset(_)))
    }

    pub fn opens(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Open(_)))
    }

    pub fn starts(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Start(_)))
    }

    /// Identification strings sent, in order
    pub fn sent_strings(&self) -> Vec<(AccessoryString, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::SendString(_, id, value) => Some((*id, value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().inbox.is_some()
    }

    /// Number of times an active subscription was torn down
    pub fn unsubscribes(&self) -> usize {
        self.lock().unsubscribes
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Start a re-enumeration of the device at `address`
    ///
    /// `returns_as` of `None` means the device never comes back.
    fn schedule_reenumeration(
        &self,
        state: &mut BusState,
        bus_number: u8,
        address: u8,
        returns_as: Option<(u16, u16)>,
    ) {
        let Some(device) = state
            .devices
            .iter_mut()
            .find(|d| d.info.bus_number == bus_number && d.info.device_address == address)
        else {
            return;
        };
        device.leaving = true;

        let returning = returns_as.map(|(vendor_id, product_id)| {
            let mut info = device.info.clone();
            info.device_address = state.next_address;
            info.vendor_id = vendor_id;
            info.product_id = product_id;
            (info, device.behavior.clone())
        });
        if returning.is_some() {
            state.next_address = state.next_address.wrapping_add(1);
        }

        let detach_delay = state.detach_delay;
        let attach_delay = state.attach_delay;
        let bus = self.clone();

        std::thread::spawn(move || {
            std::thread::sleep(detach_delay);
            let departed = {
                let mut state = bus.lock();
                let index = state
                    .devices
                    .iter()
                    .position(|d| d.info.bus_number == bus_number && d.info.device_address == address);
                index.map(|i| state.devices.remove(i).info)
            };
            if let Some(info) = departed {
                bus.emit_detached(info);
            }

            if let Some((info, behavior)) = returning {
                std::thread::sleep(attach_delay);
                bus.plug_with(info.clone(), behavior);
                bus.emit_attached(info);
            }
        });
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

fn same_slot(a: &DeviceInfo, b: &DeviceInfo) -> bool {
    a.bus_number == b.bus_number && a.device_address == b.device_address
}

impl Transport for SimulatedBus {
    type Connection = SimulatedConnection;

    fn open(&self, device: &DeviceInfo) -> Result<Self::Connection, TransportError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::Open(device.device_address));

        let behavior = state
            .devices
            .iter()
            .find(|d| same_slot(&d.info, device))
            .map(|d| d.behavior.clone())
            .ok_or(TransportError::NotFound)?;

        if behavior.fail_open {
            return Err(TransportError::Access);
        }

        state.open_connections += 1;
        Ok(SimulatedConnection {
            bus: self.clone(),
            bus_number: device.bus_number,
            address: device.device_address,
        })
    }
}

impl BusEventSource for SimulatedBus {
    fn subscribe(&mut self, inbox: Arc<EventInbox>) -> common::Result<()> {
        let mut state = self.lock();
        if state.inbox.is_some() {
            return Err(common::Error::Lifecycle("Already subscribed".to_string()));
        }
        state.inbox = Some(inbox);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let mut state = self.lock();
        if state.inbox.take().is_some() {
            state.unsubscribes += 1;
        }
    }
}

pub struct SimulatedConnection {
    bus: SimulatedBus,
    bus_number: u8,
    address: u8,
}

impl SimulatedConnection {
    fn behavior(&self, state: &BusState) -> Result<(DeviceBehavior, bool), TransportError> {
        state
            .devices
            .iter()
            .find(|d| d.info.bus_number == self.bus_number && d.info.device_address == self.address)
            .map(|d| (d.behavior.clone(), d.leaving))
            .ok_or(TransportError::NotFound)
    }
}

impl Connection for SimulatedConnection {
    fn reset(&mut self) -> Result<(), TransportError> {
        let mut state = self.bus.lock();
        state.calls.push(TransportCall::Reset(self.address));

        let (behavior, leaving) = self.behavior(&state)?;
        if behavior.fail_reset {
            return Err(TransportError::Io("reset failed".to_string()));
        }
        if leaving {
            return Ok(());
        }

        let current = state
            .devices
            .iter()
            .find(|d| d.info.bus_number == self.bus_number && d.info.device_address == self.address)
            .map(|d| (d.info.vendor_id, d.info.product_id));

        match (behavior.on_reset, current) {
            (ResetBehavior::Ignore, _) | (_, None) => {}
            (ResetBehavior::Reenumerate, Some(ids)) => {
                self.bus
                    .schedule_reenumeration(&mut state, self.bus_number, self.address, Some(ids));
            }
            (ResetBehavior::ReenumerateAs { vendor_id, product_id }, Some(_)) => {
                self.bus.schedule_reenumeration(
                    &mut state,
                    self.bus_number,
                    self.address,
                    Some((vendor_id, product_id)),
                );
            }
            (ResetBehavior::Vanish, Some(_)) => {
                self.bus
                    .schedule_reenumeration(&mut state, self.bus_number, self.address, None);
            }
        }
        Ok(())
    }

    fn send_identification_string(
        &mut self,
        id: AccessoryString,
        value: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.bus.lock();
        state
            .calls
            .push(TransportCall::SendString(self.address, id, value.to_string()));

        let (behavior, _) = self.behavior(&state)?;
        if behavior.fail_string == Some(id) {
            return Err(TransportError::Io(format!("write of {} failed", id)));
        }
        Ok(())
    }

    fn send_start_accessory_mode(&mut self) -> Result<(), TransportError> {
        let mut state = self.bus.lock();
        state.calls.push(TransportCall::Start(self.address));

        let (behavior, leaving) = self.behavior(&state)?;
        if leaving {
            return Ok(());
        }

        let current = state
            .devices
            .iter()
            .find(|d| d.info.bus_number == self.bus_number && d.info.device_address == self.address)
            .map(|d| (d.info.vendor_id, d.info.product_id));

        let returns_as = match behavior.on_start {
            StartBehavior::Ignore => return Ok(()),
            StartBehavior::SwitchToAccessory => Some((ACCESSORY_VENDOR_ID, 0x2d00)),
            StartBehavior::Reenumerate => current,
        };
        self.bus
            .schedule_reenumeration(&mut state, self.bus_number, self.address, returns_as);
        Ok(())
    }
}

impl Drop for SimulatedConnection {
    fn drop(&mut self) {
        let mut state = self.bus.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
        state.calls.push(TransportCall::Close(self.address));
    }
}

/// Listener that records every outcome in delivery order
#[derive(Default)]
pub struct RecordingListener {
    outcomes: Mutex<Vec<TransitionOutcome>>,
    signal: Condvar,
}

impl RecordingListener {
    pub fn outcomes(&self) -> Vec<TransitionOutcome> {
        self.lock().clone()
    }

    /// Wait until at least `count` outcomes arrived or `timeout` elapsed
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<TransitionOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = self.lock();

        while outcomes.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            outcomes = self
                .signal
                .wait_timeout(outcomes, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        outcomes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TransitionOutcome>> {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, outcome: TransitionOutcome) {
        self.lock().push(outcome);
        self.signal.notify_all();
    }
}

impl TransitionListener for RecordingListener {
    fn on_device_reset_complete(&self, device: Option<DeviceInfo>) {
        self.record(TransitionOutcome::ResetComplete(device));
    }

    fn on_aoap_start_complete(&self, device: Option<DeviceInfo>) {
        self.record(TransitionOutcome::AoapStartComplete(device));
    }

    fn on_aoap_start_failed(&self, device: DeviceInfo) {
        self.record(TransitionOutcome::AoapStartFailed(device));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::create_mock_phone;

    #[test]
    fn test_open_missing_device_fails() {
        let bus = SimulatedBus::new();
        let phone = create_mock_phone(1);

        assert!(matches!(bus.open(&phone), Err(TransportError::NotFound)));
        assert_eq!(bus.opens(), 1);
    }

    #[test]
    fn test_connection_close_is_tracked() {
        let bus = SimulatedBus::new();
        let phone = create_mock_phone(1);
        bus.plug(phone.clone());

        let connection = bus.open(&phone).unwrap();
        assert_eq!(bus.open_connections(), 1);
        connection.close();
        assert_eq!(bus.open_connections(), 0);
        assert_eq!(bus.calls().last(), Some(&TransportCall::Close(1)));
    }

    #[test]
    fn test_reset_reenumerates_under_new_address() {
        let bus = SimulatedBus::new();
        let mut source = bus.clone();
        let inbox = Arc::new(EventInbox::new());
        source.subscribe(inbox.clone()).unwrap();

        let phone = create_mock_phone(1);
        bus.plug(phone.clone());

        let mut connection = bus.open(&phone).unwrap();
        connection.reset().unwrap();
        drop(connection);

        let deadline = Instant::now() + Duration::from_secs(2);
        while inbox.pending() != (1, 1) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(inbox.pending(), (1, 1));

        let devices = bus.devices();
        assert_eq!(devices.len(), 1);
        assert_ne!(devices[0].device_address, phone.device_address);
        assert_eq!(devices[0].port_numbers, phone.port_numbers);
    }

    #[test]
    fn test_recording_listener_wait_times_out() {
        let listener = RecordingListener::default();
        let outcomes = listener.wait_for(1, Duration::from_millis(20));
        assert!(outcomes.is_empty());

        listener.on_device_reset_complete(None);
        assert_eq!(
            listener.wait_for(1, Duration::from_millis(20)),
            vec![TransitionOutcome::ResetComplete(None)]
        );
    }
}
