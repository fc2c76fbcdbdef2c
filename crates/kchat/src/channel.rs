// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel engine: one ring buffer broadcast to every attached subscriber.
//!
//! # Locking
//!
//! ```text
//! Channel
//! +-- subscribers: Mutex<Vec<Arc<Subscriber>>>   (lock 2)
//! +-- ring: RwLock<Ring>                         (lock 3)
//! |     shared    -> read path (cursor advance)
//! |     exclusive -> write path, readiness snapshot
//! +-- data_ready / room_ready: WaitQueue         (leaf locks)
//! ```
//!
//! Lock 2 is always taken before lock 3; the registry lock (lock 1) comes
//! before both. Wait queues are never held while acquiring 2 or 3.
//!
//! # Backpressure
//!
//! The subscriber with the most unread bytes bounds every writer: room is
//! the distance from the write cursor to one byte before that subscriber's
//! cursor. A single stalled subscriber therefore throttles the whole channel.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::{ChannelStats, ChannelStatsSnapshot};
use crate::poll::{PollWaker, Readiness};
use crate::ring::Ring;
use crate::subscriber::{Subscriber, SubscriberId};
use crate::wait::WaitQueue;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of a channel.
///
/// Two identities compare equal when their names are equal; the registry
/// maps equal identities to the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    /// Create an identity from a name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Identity of a filesystem path, as used for device-style channels.
    pub fn from_path(path: &Path) -> Self {
        Self(Arc::from(path.to_string_lossy().as_ref()))
    }

    /// The underlying name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Path> for ChannelId {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

/// Whether an operation may suspend the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoMode {
    /// Wait for data (reads) or room (writes).
    #[default]
    Blocking,
    /// Fail with [`Error::WouldBlock`] instead of waiting.
    NonBlocking,
}

impl IoMode {
    #[inline]
    fn is_nonblocking(self) -> bool {
        self == Self::NonBlocking
    }
}

/// Point-in-time description of a live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Channel identity.
    pub id: ChannelId,
    /// Buffer capacity in bytes.
    pub capacity: usize,
    /// Attached subscribers.
    pub subscribers: usize,
    /// Unread bytes of the slowest subscriber.
    pub backlog: usize,
    /// Traffic counters.
    pub stats: ChannelStatsSnapshot,
}

/// A named broadcast buffer shared by its subscribers.
pub struct Channel {
    id: ChannelId,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    ring: RwLock<Ring>,
    data_ready: WaitQueue,
    room_ready: WaitQueue,
    next_subscriber: AtomicU64,
    next_watcher: AtomicU64,
    config: Config,
    stats: ChannelStats,
}

impl Channel {
    /// Allocate a channel with an empty buffer.
    pub(crate) fn try_new(id: ChannelId, config: &Config) -> Result<Self> {
        let ring = Ring::try_new(config.capacity)?;
        Ok(Self {
            id,
            subscribers: Mutex::new(Vec::new()),
            ring: RwLock::new(ring),
            data_ready: WaitQueue::new(),
            room_ready: WaitQueue::new(),
            next_subscriber: AtomicU64::new(0),
            next_watcher: AtomicU64::new(0),
            config: config.clone(),
            stats: ChannelStats::default(),
        })
    }

    /// Channel identity.
    #[must_use]
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Add a subscriber positioned at the current write cursor.
    ///
    /// The new subscriber never observes bytes committed before this call.
    pub(crate) fn attach(&self) -> Result<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.lock();
        if self.config.subscriber_limit_reached(subscribers.len()) {
            return Err(Error::ResourceExhausted("subscriber limit"));
        }
        subscribers
            .try_reserve(1)
            .map_err(|_| Error::ResourceExhausted("subscriber"))?;

        let end = self.ring.read().end();
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber::new(id, end));
        subscribers.push(Arc::clone(&subscriber));

        log::debug!(
            "[Channel] '{}' attached {} at offset {} ({} subscribers)",
            self.id,
            id,
            end,
            subscribers.len()
        );
        Ok(subscriber)
    }

    /// Remove a subscriber.
    ///
    /// The caller must then let the registry release the channel if it
    /// became empty. Detaching an unknown (or already detached) subscriber
    /// fails with [`Error::NotFound`].
    pub(crate) fn detach(&self, id: SubscriberId) -> Result<()> {
        {
            let mut subscribers = self.subscribers.lock();
            let pos = subscribers
                .iter()
                .position(|s| s.id() == id)
                .ok_or(Error::NotFound)?;
            subscribers.remove(pos);
            log::debug!(
                "[Channel] '{}' detached {} ({} subscribers left)",
                self.id,
                id,
                subscribers.len()
            );
        }
        // The departed subscriber may have been the one holding writers back.
        self.room_ready.wake();
        Ok(())
    }

    /// Copy unread bytes for `subscriber` into `out`.
    ///
    /// Returns as soon as at least one byte is available; never waits for
    /// `out` to fill. A zero-length `out` returns 0 without blocking.
    pub(crate) fn read(
        &self,
        subscriber: &Subscriber,
        out: &mut [u8],
        mode: IoMode,
    ) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let mut ring = self.ring.read();
        while ring.unread(subscriber.cursor()) == 0 {
            let snapshot = self.data_ready.snapshot();
            drop(ring);
            if mode.is_nonblocking() {
                self.stats.inc_would_block();
                return Err(Error::WouldBlock);
            }
            if let Err(err) = self.data_ready.wait(snapshot, subscriber.interrupt_flag()) {
                self.stats.inc_interrupted();
                return Err(err);
            }
            ring = self.ring.read();
        }

        let (n, cursor) = ring.copy_out(subscriber.cursor(), out);
        subscriber.set_cursor(cursor);
        drop(ring);

        log::trace!(
            "[Channel] '{}' {} read {} bytes, offset now {}",
            self.id,
            subscriber.id(),
            n,
            cursor
        );
        self.stats.record_read(n);
        self.room_ready.wake();
        Ok(n)
    }

    /// Commit as many bytes of `data` as the slowest subscriber allows.
    ///
    /// Short writes are success; callers needing every byte committed loop.
    /// A zero-length `data` returns 0 without blocking.
    pub(crate) fn write(
        &self,
        writer: &Subscriber,
        data: &[u8],
        mode: IoMode,
    ) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let (mut ring, room) = loop {
            let subscribers = self.subscribers.lock();
            let ring = self.ring.write();
            let room = Self::room_to_write(&subscribers, &ring);
            if room > 0 {
                break (ring, room);
            }

            let snapshot = self.room_ready.snapshot();
            drop(ring);
            drop(subscribers);
            if mode.is_nonblocking() {
                self.stats.inc_would_block();
                return Err(Error::WouldBlock);
            }
            if let Err(err) = self.room_ready.wait(snapshot, writer.interrupt_flag()) {
                self.stats.inc_interrupted();
                return Err(err);
            }
        };

        let n = ring.copy_in(data, room);
        let end = ring.end();
        drop(ring);

        log::trace!(
            "[Channel] '{}' {} wrote {} of {} bytes (room {}), end now {}",
            self.id,
            writer.id(),
            n,
            data.len(),
            room,
            end
        );
        self.stats.record_write(n);
        self.data_ready.wake();
        Ok(n)
    }

    /// Readiness of `subscriber`.
    ///
    /// Takes the buffer lock exclusively so no reader advances its cursor
    /// while the snapshot is computed.
    pub(crate) fn readiness(&self, subscriber: &Subscriber) -> Readiness {
        let subscribers = self.subscribers.lock();
        let ring = self.ring.write();
        Readiness {
            readable: ring.unread(subscriber.cursor()) > 0,
            writable: Self::room_to_write(&subscribers, &ring) > 0,
        }
    }

    /// Unread bytes for `subscriber`.
    pub(crate) fn unread(&self, subscriber: &Subscriber) -> usize {
        self.ring.read().unread(subscriber.cursor())
    }

    /// Cursor of the subscriber with the most unread bytes.
    ///
    /// Ties go to the first subscriber encountered; with no subscribers the
    /// write cursor itself is returned, leaving the whole buffer free.
    fn blocking_offset(subscribers: &[Arc<Subscriber>], ring: &Ring) -> usize {
        let mut max_unread = 0;
        let mut offset = ring.end();
        for subscriber in subscribers {
            let cursor = subscriber.cursor();
            let unread = ring.unread(cursor);
            if unread > max_unread {
                max_unread = unread;
                offset = cursor;
            }
        }
        offset
    }

    /// Bytes a writer may commit right now.
    ///
    /// Needs the subscriber list locked and, for an exact answer, the ring
    /// locked exclusively.
    fn room_to_write(subscribers: &[Arc<Subscriber>], ring: &Ring) -> usize {
        ring.room_behind(Self::blocking_offset(subscribers, ring))
    }

    /// Register a poller on both wait queues; returns the watcher id.
    pub(crate) fn register_watcher(&self, waker: PollWaker) -> u64 {
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.data_ready.register(id, waker.clone());
        self.room_ready.register(id, waker);
        id
    }

    pub(crate) fn unregister_watcher(&self, id: u64) {
        self.data_ready.unregister(id);
        self.room_ready.unregister(id);
    }

    /// Wake every sleeper so it can notice a raised interruption.
    pub(crate) fn kick_waiters(&self) {
        self.data_ready.kick();
        self.room_ready.kick();
    }

    /// Subscriber count, slowest backlog and counters.
    pub fn snapshot(&self) -> ChannelSnapshot {
        let subscribers = self.subscribers.lock();
        let ring = self.ring.read();
        let slowest = Self::blocking_offset(&subscribers, &ring);
        ChannelSnapshot {
            id: self.id.clone(),
            capacity: ring.capacity(),
            subscribers: subscribers.len(),
            backlog: ring.unread(slowest),
            stats: self.stats.snapshot(),
        }
    }

    pub(crate) fn is_unsubscribed(&self) -> bool {
        self.subscribers.lock().is_empty()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        log::debug!("[Channel] '{}' destroyed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{Poller, Token};
    use std::thread;
    use std::time::Duration;

    fn channel(capacity: usize) -> Channel {
        Channel::try_new(ChannelId::from("test"), &Config::with_capacity(capacity)).unwrap()
    }

    fn read_all(ch: &Channel, sub: &Subscriber) -> Vec<u8> {
        let mut out = vec![0u8; ch.capacity()];
        match ch.read(sub, &mut out, IoMode::NonBlocking) {
            Ok(n) => out[..n].to_vec(),
            Err(Error::WouldBlock) => Vec::new(),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_attach_starts_at_write_cursor() {
        let ch = channel(16);
        let a = ch.attach().unwrap();
        assert_eq!(ch.write(&a, b"old", IoMode::NonBlocking), Ok(3));

        let b = ch.attach().unwrap();
        assert_eq!(b.cursor(), 3);
        assert!(read_all(&ch, &b).is_empty());
        assert_eq!(read_all(&ch, &a), b"old");
    }

    #[test]
    fn test_detach_unknown_is_not_found() {
        let ch = channel(16);
        let a = ch.attach().unwrap();
        assert_eq!(ch.detach(a.id()), Ok(()));
        assert_eq!(ch.detach(a.id()), Err(Error::NotFound));
        assert!(ch.is_unsubscribed());
    }

    #[test]
    fn test_subscriber_limit() {
        let config = Config::with_capacity(8).max_subscribers(1);
        let ch = Channel::try_new(ChannelId::from("limited"), &config).unwrap();
        let _a = ch.attach().unwrap();
        assert_eq!(
            ch.attach().unwrap_err(),
            Error::ResourceExhausted("subscriber limit")
        );
        assert_eq!(ch.subscriber_count(), 1);
    }

    #[test]
    fn test_room_without_subscribers_is_full_capacity_minus_slack() {
        let ch = channel(8);
        let ring = ch.ring.read();
        assert_eq!(Channel::room_to_write(&[], &ring), 7);
    }

    #[test]
    fn test_blocking_offset_picks_slowest_first() {
        let ch = channel(8);
        let a = ch.attach().unwrap();
        let b = ch.attach().unwrap();
        ch.write(&a, b"abcd", IoMode::NonBlocking).unwrap();

        // Both tied at 4 unread: first encountered wins.
        {
            let subs = ch.subscribers.lock();
            let ring = ch.ring.read();
            assert_eq!(Channel::blocking_offset(&subs, &ring), a.cursor());
        }

        let mut two = [0u8; 2];
        ch.read(&a, &mut two, IoMode::NonBlocking).unwrap();
        let subs = ch.subscribers.lock();
        let ring = ch.ring.read();
        assert_eq!(Channel::blocking_offset(&subs, &ring), b.cursor());
        assert_eq!(Channel::room_to_write(&subs, &ring), 3);
    }

    #[test]
    fn test_nonblocking_read_empty() {
        let ch = channel(8);
        let a = ch.attach().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(ch.read(&a, &mut buf, IoMode::NonBlocking), Err(Error::WouldBlock));
        assert_eq!(ch.snapshot().stats.would_block, 1);
    }

    #[test]
    fn test_zero_length_requests() {
        let ch = channel(8);
        let a = ch.attach().unwrap();
        assert_eq!(ch.read(&a, &mut [], IoMode::Blocking), Ok(0));
        assert_eq!(ch.write(&a, &[], IoMode::Blocking), Ok(0));
    }

    #[test]
    fn test_backpressure_nonblocking() {
        let ch = channel(8);
        let stalled = ch.attach().unwrap();
        assert_eq!(ch.write(&stalled, b"0123456789", IoMode::NonBlocking), Ok(7));
        assert_eq!(ch.write(&stalled, b"x", IoMode::NonBlocking), Err(Error::WouldBlock));

        let mut buf = [0u8; 2];
        assert_eq!(ch.read(&stalled, &mut buf, IoMode::NonBlocking), Ok(2));
        assert_eq!(ch.write(&stalled, b"xyz", IoMode::NonBlocking), Ok(2));
    }

    #[test]
    fn test_blocked_writer_resumes_after_detach() {
        let ch = Arc::new(channel(4));
        let writer = ch.attach().unwrap();
        let stalled = ch.attach().unwrap();
        assert_eq!(ch.write(&writer, b"abc", IoMode::NonBlocking), Ok(3));

        let mut buf = [0u8; 3];
        ch.read(&writer, &mut buf, IoMode::NonBlocking).unwrap();

        let ch2 = Arc::clone(&ch);
        let w = Arc::clone(&writer);
        let blocked = thread::spawn(move || ch2.write(&w, b"d", IoMode::Blocking));

        thread::sleep(Duration::from_millis(20));
        ch.detach(stalled.id()).unwrap();
        assert_eq!(blocked.join().unwrap(), Ok(1));
    }

    #[test]
    fn test_readiness() {
        let ch = channel(4);
        let a = ch.attach().unwrap();
        assert_eq!(
            ch.readiness(&a),
            Readiness {
                readable: false,
                writable: true
            }
        );
        ch.write(&a, b"abc", IoMode::NonBlocking).unwrap();
        assert_eq!(
            ch.readiness(&a),
            Readiness {
                readable: true,
                writable: false
            }
        );
    }

    #[test]
    fn test_watcher_lifecycle() {
        let ch = channel(8);
        let a = ch.attach().unwrap();
        let poller = Poller::new();
        let id = ch.register_watcher(poller.waker(Token(9)));
        assert_eq!(ch.data_ready.watcher_count(), 1);
        assert_eq!(ch.room_ready.watcher_count(), 1);

        ch.write(&a, b"hi", IoMode::NonBlocking).unwrap();
        assert_eq!(poller.drain(), vec![Token(9)]);

        ch.unregister_watcher(id);
        assert_eq!(ch.data_ready.watcher_count(), 0);
        assert_eq!(ch.room_ready.watcher_count(), 0);
    }

    #[test]
    fn test_snapshot_backlog() {
        let ch = channel(16);
        let a = ch.attach().unwrap();
        let _b = ch.attach().unwrap();
        ch.write(&a, b"hello", IoMode::NonBlocking).unwrap();
        read_all(&ch, &a);

        let snap = ch.snapshot();
        assert_eq!(snap.subscribers, 2);
        assert_eq!(snap.backlog, 5);
        assert_eq!(snap.capacity, 16);
        assert_eq!(snap.stats.bytes_written, 5);
        assert_eq!(snap.stats.bytes_read, 5);
    }

    #[test]
    fn test_channel_id_value_semantics() {
        let a = ChannelId::from("room");
        let b = ChannelId::new(String::from("room"));
        assert_eq!(a, b);
        assert_eq!(ChannelId::from(Path::new("/dev/kchat0")).as_str(), "/dev/kchat0");
        assert_eq!(a.to_string(), "room");
    }
}
