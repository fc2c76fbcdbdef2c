// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness polling across many channels.
//!
//! [`Handle::poll`](crate::Handle::poll) returns a [`Readiness`] snapshot and
//! a [`Registration`] tying the handle's channel to a [`Poller`] under a
//! caller-chosen [`Token`]. Every subsequent change on that channel (bytes
//! committed, bytes consumed, subscriber gone) queues the token on the poller
//! until the registration is dropped.
//!
//! ```text
//! Handle A --poll(&poller, Token(0))--+
//!                                      +--> Poller { pending tokens, doorbell }
//! Handle B --poll(&poller, Token(1))--+             |
//!                                                   v
//!                                       poller.wait(timeout) -> [Token(1)]
//! ```
//!
//! A token means "state may have changed": callers re-query readiness and
//! retry non-blocking I/O. Tokens are coalesced while pending.
//!
//! The doorbell is a crossbeam receiver, so an event loop can multiplex the
//! poller with other crossbeam channels via `crossbeam::select!`.

use crate::channel::Channel;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Caller-chosen identifier delivered when a registered channel changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

/// Point-in-time readiness of a handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// At least one unread byte is available to this subscriber.
    pub readable: bool,
    /// A write would commit at least one byte without blocking.
    pub writable: bool,
}

impl Readiness {
    /// Neither readable nor writable.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.readable && !self.writable
    }
}

struct Shared {
    pending: Mutex<Vec<Token>>,
    bell: Sender<()>,
}

/// Collects wake tokens from any number of channel registrations.
pub struct Poller {
    shared: Arc<Shared>,
    doorbell: Receiver<()>,
}

impl Poller {
    /// Create an empty poller.
    #[must_use]
    pub fn new() -> Self {
        let (bell, doorbell) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Vec::new()),
                bell,
            }),
            doorbell,
        }
    }

    /// Block until at least one registration fires or `timeout` elapses.
    ///
    /// Returns the pending tokens, possibly empty on timeout or after a
    /// wake whose tokens were already drained.
    pub fn wait(&self, timeout: Option<Duration>) -> Vec<Token> {
        match timeout {
            Some(timeout) => {
                let _ = self.doorbell.recv_timeout(timeout);
            }
            None => {
                let _ = self.doorbell.recv();
            }
        }
        self.drain()
    }

    /// Take the pending tokens without blocking.
    pub fn drain(&self) -> Vec<Token> {
        let _ = self.doorbell.try_recv();
        std::mem::take(&mut *self.shared.pending.lock())
    }

    /// Doorbell rung whenever a token is queued, for use with `crossbeam::select!`.
    ///
    /// After receiving from it, call [`Poller::drain`] to collect the tokens.
    #[must_use]
    pub fn doorbell(&self) -> &Receiver<()> {
        &self.doorbell
    }

    pub(crate) fn waker(&self, token: Token) -> PollWaker {
        PollWaker {
            shared: Arc::clone(&self.shared),
            token,
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("pending", &self.shared.pending.lock().len())
            .finish()
    }
}

/// Wake side of a registration, stored in the channel's wait queues.
#[derive(Clone)]
pub(crate) struct PollWaker {
    shared: Arc<Shared>,
    token: Token,
}

impl PollWaker {
    pub(crate) fn wake(&self) {
        {
            let mut pending = self.shared.pending.lock();
            if !pending.contains(&self.token) {
                pending.push(self.token);
            }
        }
        // Full means a ring is already outstanding.
        let _ = self.shared.bell.try_send(());
    }
}

/// Active interest of a poller in one channel.
///
/// Dropping the registration cancels it.
pub struct Registration {
    channel: Weak<Channel>,
    id: u64,
    token: Token,
}

impl Registration {
    pub(crate) fn new(channel: &Arc<Channel>, id: u64, token: Token) -> Self {
        Self {
            channel: Arc::downgrade(channel),
            id,
            token,
        }
    }

    /// Token delivered by this registration.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unregister_watcher(self.id);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("token", &self.token)
            .field("id", &self.id)
            .finish()
    }
}
