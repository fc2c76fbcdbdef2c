// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # kchat
//!
//! Broadcast byte channels for local inter-thread and inter-process chat.
//!
//! Every participant attached to a named channel sees every byte written to
//! it, in commit order, from the moment it attached. Each participant keeps
//! its own read position; the slowest one throttles all writers.
//!
//! ## Quick Start
//!
//! ```
//! use kchat::{IoMode, Registry};
//!
//! let registry = Registry::with_defaults();
//! let alice = registry.attach("lobby")?;
//! let mut bob = registry.attach("lobby")?;
//!
//! alice.write(b"hello", IoMode::Blocking)?;
//!
//! let mut buf = [0u8; 64];
//! let n = bob.read(&mut buf, IoMode::Blocking)?;
//! assert_eq!(&buf[..n], b"hello");
//!
//! alice.detach()?;
//! bob.detach()?;
//! assert_eq!(registry.channel_count(), 0);
//! # Ok::<(), kchat::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`registry`]: identity -> channel directory, lazy creation and release
//! - [`channel`]: ring buffer engine, backpressure and wait/wake protocol
//! - [`handle`]: per-attachment entry points and interrupters
//! - [`poll`]: readiness snapshots and multi-channel pollers
//! - [`config`]: capacity and limits, loadable from TOML

pub mod channel;
pub mod config;
pub mod error;
pub mod handle;
mod metrics;
pub mod poll;
pub mod registry;
mod ring;
mod subscriber;
mod wait;

pub use channel::{Channel, ChannelId, ChannelSnapshot, IoMode};
pub use config::{Config, ConfigError, DEFAULT_CAPACITY, MIN_CAPACITY};
pub use error::{Error, Result};
pub use handle::{Handle, Interrupter};
pub use metrics::ChannelStatsSnapshot;
pub use poll::{Poller, Readiness, Registration, Token};
pub use registry::Registry;
pub use ring::dist;
pub use subscriber::SubscriberId;
