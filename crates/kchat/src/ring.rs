// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-capacity circular byte buffer shared by all subscribers of a channel.
//!
//! # Layout
//!
//! ```text
//!            slowest cursor         end (write cursor)
//!                  v                  v
//! [ . . . . . . . |x x x x x x x x x |. . . . . . ]
//!                  \__ unread (max) _/\__ room __/
//! ```
//!
//! There is no fill counter. A cursor equal to `end` means "nothing unread";
//! writers always stop one byte short of the slowest cursor so that a full
//! buffer never looks empty.

use crate::error::{Error, Result};

/// Forward distance from `from` to `to` in a ring of `capacity` bytes.
///
/// Asymmetric: `dist(a, b, c) != dist(b, a, c)` unless `a == b`, in which
/// case it is zero.
#[inline]
#[must_use]
pub fn dist(from: usize, to: usize, capacity: usize) -> usize {
    if from <= to {
        to - from
    } else {
        capacity + to - from
    }
}

/// Ring storage plus the shared write cursor.
#[derive(Debug)]
pub(crate) struct Ring {
    buf: Box<[u8]>,
    end: usize,
}

impl Ring {
    /// Allocate a zeroed ring, reporting allocation failure instead of aborting.
    pub(crate) fn try_new(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| Error::ResourceExhausted("channel buffer"))?;
        buf.resize(capacity, 0);
        Ok(Self {
            buf: buf.into_boxed_slice(),
            end: 0,
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Current write cursor.
    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.end
    }

    /// Bytes a subscriber positioned at `cursor` has not read yet.
    #[inline]
    pub(crate) fn unread(&self, cursor: usize) -> usize {
        dist(cursor, self.end, self.capacity())
    }

    /// Room left for writers when the slowest subscriber sits at `slowest`.
    #[inline]
    pub(crate) fn room_behind(&self, slowest: usize) -> usize {
        let cap = self.capacity();
        let limit = (slowest + cap - 1) % cap;
        dist(self.end, limit, cap)
    }

    /// Copy unread bytes starting at `cursor` into `out`.
    ///
    /// Returns the number of bytes copied and the advanced cursor.
    pub(crate) fn copy_out(&self, cursor: usize, out: &mut [u8]) -> (usize, usize) {
        let cap = self.capacity();
        let n = out.len().min(self.unread(cursor));
        let first = n.min(cap - cursor);
        out[..first].copy_from_slice(&self.buf[cursor..cursor + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);
        (n, (cursor + n) % cap)
    }

    /// Append up to `room` bytes of `data` at the write cursor.
    ///
    /// Returns the number of bytes committed.
    pub(crate) fn copy_in(&mut self, data: &[u8], room: usize) -> usize {
        let cap = self.capacity();
        let n = data.len().min(room);
        let end = self.end;
        let first = n.min(cap - end);
        self.buf[end..end + first].copy_from_slice(&data[..first]);
        self.buf[..n - first].copy_from_slice(&data[first..n]);
        self.end = (end + n) % cap;
        n
    }
}
