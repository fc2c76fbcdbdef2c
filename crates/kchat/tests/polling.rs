// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness polling integration tests

use kchat::{Config, IoMode, Poller, Readiness, Registry, Token};
use std::thread;
use std::time::Duration;

const LOBBY: Token = Token(0);
const DEV: Token = Token(1);

#[test]
fn test_poller_spans_channels() {
    let registry = Registry::new(Config::with_capacity(32)).expect("Failed to create registry");
    let lobby = registry.attach("lobby").expect("Failed to attach lobby");
    let mut dev = registry.attach("dev").expect("Failed to attach dev");
    let dev_writer = registry.attach("dev").expect("Failed to attach dev writer");

    let poller = Poller::new();
    let (lobby_ready, _lobby_reg) = lobby.poll(&poller, LOBBY);
    let (dev_ready, _dev_reg) = dev.poll(&poller, DEV);
    assert!(!lobby_ready.readable);
    assert!(!dev_ready.readable);

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        dev_writer.write(b"ping", IoMode::Blocking).expect("write failed");
        dev_writer
    });

    let tokens = poller.wait(Some(Duration::from_secs(5)));
    assert_eq!(tokens, vec![DEV]);
    assert!(dev.readiness().readable);

    let mut buf = [0u8; 8];
    let n = dev.read(&mut buf, IoMode::NonBlocking).expect("read failed");
    assert_eq!(&buf[..n], b"ping");
    writer.join().expect("writer panicked");
}

#[test]
fn test_poll_snapshot_reports_pending_data() {
    let registry = Registry::new(Config::with_capacity(8)).expect("Failed to create registry");
    let reader = registry.attach("snap").expect("Failed to attach reader");
    let writer = registry.attach("snap").expect("Failed to attach writer");
    writer.write(b"1234567", IoMode::NonBlocking).expect("write failed");

    let poller = Poller::new();
    let (ready, _reg) = reader.poll(&poller, Token(5));
    assert_eq!(
        ready,
        Readiness {
            readable: true,
            writable: false,
        }
    );
    // The snapshot was computed after registering; nothing has changed since.
    assert!(poller.drain().is_empty());
}

#[test]
fn test_poller_woken_when_room_frees() {
    let registry = Registry::new(Config::with_capacity(4)).expect("Failed to create registry");
    let writer = registry.attach("room").expect("Failed to attach writer");
    let mut reader = registry.attach("room").expect("Failed to attach reader");
    writer.write(b"abc", IoMode::NonBlocking).expect("write failed");

    let poller = Poller::new();
    let (ready, _reg) = writer.poll(&poller, Token(2));
    assert!(!ready.writable);

    reader
        .read(&mut [0u8; 4], IoMode::NonBlocking)
        .expect("read failed");
    assert_eq!(poller.wait(Some(Duration::from_secs(1))), vec![Token(2)]);
    // Still blocked by the writer's own unread bytes.
    assert!(!writer.readiness().writable);
}

#[test]
fn test_registration_outlives_channel() {
    let registry = Registry::with_defaults();
    let handle = registry.attach("short").expect("Failed to attach");
    let poller = Poller::new();
    let (_, registration) = handle.poll(&poller, Token(9));

    handle.detach().expect("detach failed");
    assert_eq!(registry.channel_count(), 0);
    drop(registration);
}
