// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kchat::{Config, IoMode, Registry};
use std::thread;

// ============================================================================
// Single-threaded write + read
// ============================================================================

/// Benchmark: one write followed by one read per subscriber, no contention.
fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_read");

    for &size in &[16usize, 256, 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let registry = Registry::with_defaults();
            let mut writer = registry.attach("bench").unwrap();
            let mut reader = registry.attach("bench").unwrap();
            let payload = vec![0x5au8; size];
            let mut buf = vec![0u8; size];

            b.iter(|| {
                writer.write_all(black_box(&payload)).unwrap();
                let mut got = 0;
                while got < size {
                    got += reader.read(&mut buf[got..], IoMode::NonBlocking).unwrap();
                }
                let mut own = 0;
                while own < size {
                    own += writer.read(&mut buf[own..], IoMode::NonBlocking).unwrap();
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// Fan-out
// ============================================================================

/// Benchmark: 1 KiB broadcast to N subscribers, each draining in turn.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_1k");
    group.throughput(Throughput::Bytes(1024));

    for &subscribers in &[2usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                let registry = Registry::with_defaults();
                let mut writer = registry.attach("fanout").unwrap();
                let mut readers: Vec<_> = (0..subscribers)
                    .map(|_| registry.attach("fanout").unwrap())
                    .collect();
                let payload = [0xa5u8; 1024];
                let mut buf = [0u8; 1024];

                b.iter(|| {
                    writer.write_all(&payload).unwrap();
                    for reader in readers.iter_mut().chain(std::iter::once(&mut writer)) {
                        let mut got = 0;
                        while got < payload.len() {
                            got += reader.read(&mut buf[got..], IoMode::NonBlocking).unwrap();
                        }
                    }
                })
            },
        );
    }
    group.finish();
}

// ============================================================================
// Cross-thread streaming
// ============================================================================

/// Benchmark: 64 KiB streamed through a 2 KiB channel between two threads.
fn bench_stream(c: &mut Criterion) {
    const TOTAL: usize = 64 * 1024;
    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(TOTAL as u64));

    group.bench_function("blocking_64k", |b| {
        b.iter(|| {
            let registry = Registry::new(Config::default()).unwrap();
            let mut producer = registry.attach("stream").unwrap();
            let mut consumer = registry.attach("stream").unwrap();

            let tx = thread::spawn(move || {
                let chunk = [1u8; 512];
                let mut sink = [0u8; 2048];
                let mut sent = 0;
                while sent < TOTAL {
                    sent += producer.write(&chunk, IoMode::Blocking).unwrap();
                    while producer.read(&mut sink, IoMode::NonBlocking).is_ok() {}
                }
            });

            let mut buf = [0u8; 2048];
            let mut got = 0;
            while got < TOTAL {
                got += consumer.read(&mut buf, IoMode::Blocking).unwrap();
            }
            tx.join().unwrap();
            black_box(got)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_write_read, bench_fanout, bench_stream);
criterion_main!(benches);
