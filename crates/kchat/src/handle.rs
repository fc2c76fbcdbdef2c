// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Attachment handle: the read/write/poll/detach entry points.
//!
//! A [`Handle`] is obtained from [`Registry::attach`] and owns exactly one
//! subscriber. It is consumed by [`Handle::detach`]; dropping it detaches
//! as well. Reads borrow the handle mutably, so a handle can never be
//! detached while one of its reads is blocked.

use crate::channel::{Channel, ChannelId, IoMode};
use crate::error::Result;
use crate::poll::{Poller, Readiness, Registration, Token};
use crate::registry::Registry;
use crate::subscriber::{Subscriber, SubscriberId};
use std::fmt;
use std::io;
use std::sync::{Arc, Weak};

/// One subscriber attached to one channel.
pub struct Handle {
    registry: Arc<Registry>,
    channel: Arc<Channel>,
    subscriber: Arc<Subscriber>,
    detached: bool,
}

impl Handle {
    pub(crate) fn new(
        registry: Arc<Registry>,
        channel: Arc<Channel>,
        subscriber: Arc<Subscriber>,
    ) -> Self {
        Self {
            registry,
            channel,
            subscriber,
            detached: false,
        }
    }

    /// Channel this handle is attached to.
    #[must_use]
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    #[must_use]
    pub fn channel_id(&self) -> &ChannelId {
        self.channel.id()
    }

    #[must_use]
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Buffer capacity of the channel.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.channel.capacity()
    }

    /// Bytes committed since this subscriber last read.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.channel.unread(&self.subscriber)
    }

    /// Read unread bytes into `buf`.
    ///
    /// Blocking mode waits until at least one byte is available, then
    /// returns whatever is there up to `buf.len()`.
    pub fn read(&mut self, buf: &mut [u8], mode: IoMode) -> Result<usize> {
        self.channel.read(&self.subscriber, buf, mode)
    }

    /// Commit a prefix of `data` to the channel.
    ///
    /// The prefix is bounded by the room left behind the slowest subscriber,
    /// including this one: a writer that never reads will eventually block
    /// itself.
    pub fn write(&self, data: &[u8], mode: IoMode) -> Result<usize> {
        self.channel.write(&self.subscriber, data, mode)
    }

    /// Commit all of `data`, blocking for room as needed.
    ///
    /// On interruption, bytes committed before the interruption stay
    /// committed; the count is lost with the error.
    pub fn write_all(&self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data, IoMode::Blocking)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Current readiness.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.channel.readiness(&self.subscriber)
    }

    /// Readiness snapshot plus a registration that queues `token` on
    /// `poller` whenever the channel changes.
    ///
    /// The registration is made before the snapshot is taken, so a change
    /// racing with this call is either in the snapshot or delivered as a
    /// token.
    pub fn poll(&self, poller: &Poller, token: Token) -> (Readiness, Registration) {
        let id = self.channel.register_watcher(poller.waker(token));
        let registration = Registration::new(&self.channel, id, token);
        (self.readiness(), registration)
    }

    /// Interrupter for blocking calls on this handle, usable from other threads.
    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            subscriber: Arc::clone(&self.subscriber),
            channel: Arc::downgrade(&self.channel),
        }
    }

    /// Detach from the channel, destroying it if this was the last subscriber.
    pub fn detach(mut self) -> Result<()> {
        self.detached = true;
        self.release()
    }

    fn release(&self) -> Result<()> {
        let detached = self.channel.detach(self.subscriber.id());
        // Release even on NotFound: the channel may already be empty.
        self.registry.release_if_empty(&self.channel);
        detached
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Err(err) = self.release() {
            log::warn!(
                "[Handle] implicit detach of {} from '{}' failed: {}",
                self.subscriber.id(),
                self.channel.id(),
                err
            );
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("channel", self.channel.id())
            .field("subscriber", &self.subscriber.id())
            .finish()
    }
}

impl io::Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Handle::read(self, buf, IoMode::Blocking).map_err(io::Error::from)
    }
}

impl io::Write for Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Handle::write(self, buf, IoMode::Blocking).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Aborts blocking reads and writes of one handle.
///
/// An interruption raised while the handle is not waiting stays pending and
/// aborts the next blocking wait.
#[derive(Clone)]
pub struct Interrupter {
    subscriber: Arc<Subscriber>,
    channel: Weak<Channel>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.subscriber.raise_interrupt();
        if let Some(channel) = self.channel.upgrade() {
            channel.kick_waiters();
        }
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupter")
            .field("subscriber", &self.subscriber.id())
            .finish()
    }
}
