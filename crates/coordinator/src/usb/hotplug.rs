//! Hotplug event source
//!
//! libusb delivers hotplug callbacks from inside `handle_events`, so the
//! monitor runs that loop on a dedicated `usb-events` thread. Callbacks only
//! describe the device and append to the inbox; they never issue transfers.

use super::device::describe_device;
use crate::inbox::EventInbox;
use crate::transport::BusEventSource;
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct HotplugMonitor {
    context: Context,
    running: Arc<AtomicBool>,
    registration: Option<Registration<Context>>,
    thread: Option<JoinHandle<()>>,
}

impl HotplugMonitor {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            running: Arc::new(AtomicBool::new(false)),
            registration: None,
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl BusEventSource for HotplugMonitor {
    fn subscribe(&mut self, inbox: Arc<EventInbox>) -> common::Result<()> {
        if self.registration.is_some() {
            return Err(common::Error::Lifecycle(
                "Hotplug monitor already subscribed".to_string(),
            ));
        }

        if !rusb::has_hotplug() {
            return Err(common::Error::Usb(
                "libusb on this platform does not support hotplug".to_string(),
            ));
        }

        let callback: Box<dyn Hotplug<Context>> = Box::new(InboxForwarder { inbox });
        let registration = HotplugBuilder::new()
            .enumerate(false)
            .register(&self.context, callback)
            .map_err(|e| common::Error::Usb(format!("Failed to register hotplug callback: {}", e)))?;

        self.running.store(true, Ordering::SeqCst);
        let context = self.context.clone();
        let running = self.running.clone();

        let spawned = std::thread::Builder::new()
            .name("usb-events".to_string())
            .spawn(move || run_event_loop(context, running));

        match spawned {
            Ok(handle) => {
                self.registration = Some(registration);
                self.thread = Some(handle);
                info!("Hotplug monitor started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    fn unsubscribe(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            warn!("USB event thread panicked");
        }

        if self.registration.take().is_some() {
            info!("Hotplug monitor stopped");
        }
    }
}

impl Drop for HotplugMonitor {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn run_event_loop(context: Context, running: Arc<AtomicBool>) {
    debug!("USB event thread started");

    while running.load(Ordering::SeqCst) {
        match context.handle_events(Some(EVENT_POLL_INTERVAL)) {
            Ok(()) => {}
            Err(rusb::Error::Interrupted) => {
                debug!("USB event handling interrupted");
            }
            Err(e) => {
                warn!("Error handling USB events: {}", e);
                std::thread::sleep(EVENT_POLL_INTERVAL);
            }
        }
    }

    debug!("USB event thread stopped");
}

struct InboxForwarder {
    inbox: Arc<EventInbox>,
}

impl<T: UsbContext> Hotplug<T> for InboxForwarder {
    fn device_arrived(&mut self, device: Device<T>) {
        match describe_device(&device) {
            Ok(info) => {
                debug!("Hotplug: attached {}", info);
                self.inbox.record_attached(info);
            }
            Err(e) => warn!(
                "Hotplug: cannot describe arriving device bus={} addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            ),
        }
    }

    fn device_left(&mut self, device: Device<T>) {
        match describe_device(&device) {
            Ok(info) => {
                debug!("Hotplug: detached {}", info);
                self.inbox.record_detached(info);
            }
            Err(e) => warn!(
                "Hotplug: cannot describe departing device bus={} addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            ),
        }
    }
}
