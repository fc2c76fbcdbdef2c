// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Backpressure integration tests
//!
//! The subscriber with the most unread bytes bounds every writer. With a
//! capacity of 8 at most 7 bytes can be outstanding.

use kchat::{Config, Error, IoMode, Registry};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CAPACITY: usize = 8;

fn registry() -> Arc<Registry> {
    Registry::new(Config::with_capacity(CAPACITY)).expect("Failed to create registry")
}

#[test]
fn test_nonblocking_write_stops_at_slack() {
    let registry = registry();
    let writer = registry.attach("bp").expect("Failed to attach writer");
    let mut stalled = registry.attach("bp").expect("Failed to attach stalled");

    assert_eq!(writer.write(b"0123456789", IoMode::NonBlocking), Ok(CAPACITY - 1));
    assert_eq!(writer.write(b"x", IoMode::NonBlocking), Err(Error::WouldBlock));
    assert!(!writer.readiness().writable);

    let mut one = [0u8; 1];
    assert_eq!(stalled.read(&mut one, IoMode::NonBlocking), Ok(1));
    assert_eq!(&one, b"0");

    // The writer's own cursor is now the slowest one.
    assert_eq!(writer.write(b"x", IoMode::NonBlocking), Err(Error::WouldBlock));
}

#[test]
fn test_blocked_writer_resumes_after_slowest_reads() {
    let registry = registry();
    let mut writer = registry.attach("bp").expect("Failed to attach writer");
    let mut stalled = registry.attach("bp").expect("Failed to attach stalled");

    assert_eq!(writer.write(b"abcdefg", IoMode::NonBlocking), Ok(7));
    let mut sink = [0u8; CAPACITY];
    assert_eq!(writer.read(&mut sink, IoMode::NonBlocking), Ok(7));

    let (done_tx, done_rx) = mpsc::channel();
    let producer = thread::spawn(move || {
        let result = writer.write(b"xyz", IoMode::Blocking);
        done_tx.send(()).expect("send failed");
        (writer, result)
    });

    // Still stalled: nothing consumed yet.
    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

    let mut one = [0u8; 1];
    assert_eq!(stalled.read(&mut one, IoMode::Blocking), Ok(1));

    let (_writer, result) = producer.join().expect("producer panicked");
    // Exactly one byte of room opened up: a short write.
    assert_eq!(result, Ok(1));

    let mut rest = [0u8; CAPACITY];
    let n = stalled.read(&mut rest, IoMode::NonBlocking).expect("read failed");
    assert_eq!(&rest[..n], b"bcdefgx");
}

#[test]
fn test_blocked_writer_interrupted() {
    let registry = registry();
    let writer = registry.attach("int").expect("Failed to attach writer");
    assert_eq!(writer.write(b"1234567", IoMode::NonBlocking), Ok(7));

    let interrupter = writer.interrupter();
    let producer = thread::spawn(move || {
        let result = writer.write(b"8", IoMode::Blocking);
        (writer, result)
    });

    thread::sleep(Duration::from_millis(20));
    interrupter.interrupt();
    let (_writer, result) = producer.join().expect("producer panicked");
    assert_eq!(result, Err(Error::Interrupted));

    let stats = &registry.snapshot()[0].stats;
    assert_eq!(stats.interrupted, 1);
    assert_eq!(stats.bytes_written, 7);
}

#[test]
fn test_blocked_reader_interrupted() {
    let registry = registry();
    let mut reader = registry.attach("int").expect("Failed to attach reader");
    let interrupter = reader.interrupter();

    let consumer = thread::spawn(move || {
        let mut buf = [0u8; 4];
        reader.read(&mut buf, IoMode::Blocking)
    });

    thread::sleep(Duration::from_millis(20));
    interrupter.interrupt();
    assert_eq!(consumer.join().expect("consumer panicked"), Err(Error::Interrupted));
}

#[test]
fn test_interrupt_targets_one_handle() {
    let registry = registry();
    let mut a = registry.attach("pair").expect("Failed to attach a");
    let mut b = registry.attach("pair").expect("Failed to attach b");
    let writer = registry.attach("pair").expect("Failed to attach writer");
    let a_int = a.interrupter();

    let a_thread = thread::spawn(move || a.read(&mut [0u8; 4], IoMode::Blocking));
    let b_thread = thread::spawn(move || {
        let mut buf = [0u8; 4];
        let n = b.read(&mut buf, IoMode::Blocking)?;
        Ok::<_, Error>(buf[..n].to_vec())
    });

    thread::sleep(Duration::from_millis(20));
    a_int.interrupt();
    assert_eq!(a_thread.join().expect("a panicked"), Err(Error::Interrupted));

    // b went back to sleep and still receives data afterwards.
    writer.write(b"hi", IoMode::Blocking).expect("write failed");
    assert_eq!(b_thread.join().expect("b panicked"), Ok(b"hi".to_vec()));
}

#[test]
fn test_detach_of_slowest_frees_writers() {
    let registry = registry();
    let mut writer = registry.attach("leave").expect("Failed to attach writer");
    let stalled = registry.attach("leave").expect("Failed to attach stalled");

    writer.write(b"abcdefg", IoMode::NonBlocking).expect("write failed");
    writer
        .read(&mut [0u8; CAPACITY], IoMode::NonBlocking)
        .expect("read failed");
    assert!(!writer.readiness().writable);

    stalled.detach().expect("detach failed");
    assert!(writer.readiness().writable);
    assert_eq!(writer.write(b"h", IoMode::NonBlocking), Ok(1));
}
