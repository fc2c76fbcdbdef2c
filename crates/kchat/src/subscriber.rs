// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-attachment read state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Identifier of a subscriber, unique within its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    /// Raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Read cursor of one attachment.
///
/// The cursor is advanced by its owner while holding the channel's buffer
/// lock in shared mode; it is read by writers and pollers while holding
/// the buffer lock exclusively, so no reader can move it mid-snapshot.
#[derive(Debug)]
pub(crate) struct Subscriber {
    id: SubscriberId,
    cursor: AtomicUsize,
    interrupt: AtomicBool,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, cursor: usize) -> Self {
        Self {
            id,
            cursor: AtomicUsize::new(cursor),
            interrupt: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    #[inline]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_cursor(&self, cursor: usize) {
        self.cursor.store(cursor, Ordering::Release);
    }

    /// Flag consumed by the next (or current) blocking wait.
    #[inline]
    pub(crate) fn interrupt_flag(&self) -> &AtomicBool {
        &self.interrupt
    }

    pub(crate) fn raise_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }
}
