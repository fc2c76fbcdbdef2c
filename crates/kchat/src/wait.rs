// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wait queues for the "data available" and "room available" conditions.
//!
//! A queue is a generation counter guarded by a mutex and paired with a
//! condvar. Waiters snapshot the generation while still holding the buffer
//! lock, release the buffer lock, then sleep until the generation moves:
//!
//! ```text
//! waiter                               waker
//! ------                               -----
//! lock buffer
//! predicate false
//! snap = queue.snapshot()
//! unlock buffer
//!                                      lock buffer, mutate, unlock
//!                                      queue.wake()  -> generation += 1
//! queue.wait(snap)  -> returns at once
//! lock buffer, re-check predicate
//! ```
//!
//! A wake between `snapshot` and `wait` is never lost. A returned wait says
//! only that *something* changed; callers always re-check their predicate.
//!
//! Pollers are also registered here and receive a token on every wake.

use crate::error::{Error, Result};
use crate::poll::PollWaker;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

struct Watcher {
    id: u64,
    waker: PollWaker,
}

/// Condition-variable style wait queue with poller registration.
pub(crate) struct WaitQueue {
    generation: Mutex<u64>,
    condvar: Condvar,
    watchers: Mutex<Vec<Watcher>>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            condvar: Condvar::new(),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Current generation, taken before releasing the buffer lock.
    #[inline]
    pub(crate) fn snapshot(&self) -> u64 {
        *self.generation.lock()
    }

    /// Sleep until the generation differs from `snapshot`.
    ///
    /// A pending interruption (`cancel` set) is consumed and reported as
    /// [`Error::Interrupted`], whether it was raised before or during the wait.
    /// A generation change takes precedence and leaves the interruption pending.
    pub(crate) fn wait(&self, snapshot: u64, cancel: &AtomicBool) -> Result<()> {
        let mut generation = self.generation.lock();
        loop {
            if *generation != snapshot {
                return Ok(());
            }
            if cancel.swap(false, Ordering::AcqRel) {
                return Err(Error::Interrupted);
            }
            self.condvar.wait(&mut generation);
        }
    }

    /// Advance the generation, wake every sleeper and notify pollers.
    pub(crate) fn wake(&self) {
        {
            let mut generation = self.generation.lock();
            *generation = generation.wrapping_add(1);
        }
        self.condvar.notify_all();

        for watcher in self.watchers.lock().iter() {
            watcher.waker.wake();
        }
    }

    /// Wake sleepers without advancing the generation.
    ///
    /// Used after raising an interruption: sleepers re-check their cancel
    /// flag and go back to sleep if it is not theirs.
    pub(crate) fn kick(&self) {
        let _guard = self.generation.lock();
        self.condvar.notify_all();
    }

    pub(crate) fn register(&self, id: u64, waker: PollWaker) {
        self.watchers.lock().push(Watcher { id, waker });
    }

    pub(crate) fn unregister(&self, id: u64) {
        self.watchers.lock().retain(|w| w.id != id);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }
}
