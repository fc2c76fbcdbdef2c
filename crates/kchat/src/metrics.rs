// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-channel traffic counters.
//!
//! All counters use `Relaxed` ordering; they are eventually consistent
//! across threads and meant for reporting only.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters attached to every channel.
#[derive(Debug, Default)]
pub(crate) struct ChannelStats {
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    writes: AtomicU64,
    reads: AtomicU64,
    would_block: AtomicU64,
    interrupted: AtomicU64,
}

impl ChannelStats {
    #[inline]
    pub(crate) fn record_write(&self, bytes: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_read(&self, bytes: usize) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_would_block(&self) {
        self.would_block.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ChannelStatsSnapshot {
        ChannelStatsSnapshot {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            would_block: self.would_block.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStatsSnapshot {
    /// Bytes committed to the buffer.
    pub bytes_written: u64,
    /// Bytes copied out, summed over all subscribers.
    pub bytes_read: u64,
    /// Successful write calls.
    pub writes: u64,
    /// Successful read calls.
    pub reads: u64,
    /// Non-blocking calls that found no data or no room.
    pub would_block: u64,
    /// Blocking waits abandoned through an interrupter.
    pub interrupted: u64,
}
