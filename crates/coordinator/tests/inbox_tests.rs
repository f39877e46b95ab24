//! Event Inbox Property Tests
//!
//! Whatever mix of events is pending, consuming a queue leaves it empty and
//! only ever yields a device on the original's port.
//!
//! Run with: `cargo test -p coordinator --test inbox_tests`

use common::test_utils::create_mock_phone;
use coordinator::{CancellationToken, EventInbox, PortPathMatcher};
use proptest::prelude::*;
use protocol::DeviceInfo;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn device_on_port(address: u8, port: u8) -> DeviceInfo {
    let mut device = DeviceInfo::new(1, address, 0x18d1, 0x2d00);
    device.port_numbers = vec![port];
    device
}

proptest! {
    #[test]
    fn prop_take_matching_attachment_drains_queue(ports in prop::collection::vec(1u8..6, 0..16)) {
        let inbox = EventInbox::new();
        let original = create_mock_phone(1);
        for (i, port) in ports.iter().enumerate() {
            inbox.record_attached(device_on_port(100 + i as u8, *port));
        }

        let found = inbox.take_matching_attachment(&original, &PortPathMatcher::new());

        prop_assert_eq!(found.is_some(), ports.contains(&1));
        if let Some(device) = found {
            prop_assert_eq!(device.port_numbers, vec![1]);
        }
        prop_assert_eq!(inbox.pending(), (0, 0));
    }

    #[test]
    fn prop_take_matching_removal_drains_queue(ports in prop::collection::vec(1u8..6, 0..16)) {
        let inbox = EventInbox::new();
        let original = create_mock_phone(1);
        for (i, port) in ports.iter().enumerate() {
            inbox.record_detached(device_on_port(100 + i as u8, *port));
            inbox.record_attached(device_on_port(200 - i as u8, *port));
        }

        let matched = inbox.take_matching_removal(&original, &PortPathMatcher::new());

        prop_assert_eq!(matched, ports.contains(&1));
        // Only the removed queue is consumed
        prop_assert_eq!(inbox.pending(), (0, ports.len()));
    }
}

#[test]
fn test_cancel_wakes_every_waiter() {
    let inbox = Arc::new(EventInbox::new());
    let cancel = CancellationToken::new();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let inbox = inbox.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                let start = Instant::now();
                inbox.await_event(Duration::from_secs(10), &cancel);
                start.elapsed()
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    inbox.cancel_waiters(&cancel);

    for waiter in waiters {
        let waited = waiter.join().expect("waiter panicked");
        assert!(waited < Duration::from_secs(5));
    }
    assert!(cancel.is_cancelled());
}
