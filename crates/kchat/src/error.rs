// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for channel operations.

use std::io;
use thiserror::Error;

/// Errors returned by registry, channel and handle operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Allocation failed or a configured limit was reached.
    ///
    /// Any partially created state (a freshly created channel left without
    /// subscribers) has already been released when this is returned.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// Non-blocking call found no data to read or no room to write.
    #[error("operation would block")]
    WouldBlock,

    /// A blocking wait was abandoned before its condition became true.
    #[error("wait interrupted")]
    Interrupted,

    /// The referenced subscriber or channel does not exist.
    #[error("subscriber or channel not found")]
    NotFound,
}

impl Error {
    /// Returns true for outcomes the caller is expected to retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::Interrupted)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::ResourceExhausted(_) => io::ErrorKind::OutOfMemory,
            Error::WouldBlock => io::ErrorKind::WouldBlock,
            Error::Interrupted => io::ErrorKind::Interrupted,
            Error::NotFound => io::ErrorKind::NotFound,
        };
        io::Error::new(kind, err)
    }
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;
