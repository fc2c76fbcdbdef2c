// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Channel registry: identity -> channel, created on first attach and
//! destroyed with its last subscriber.
//!
//! # Architecture
//!
//! ```text
//! Registry (owned by the caller, shared via Arc)
//! +-- config: Config
//! +-- channels: Mutex<HashMap<ChannelId, Arc<Channel>>>   (lock 1)
//!
//! attach(id)  : lock 1 -> resolve_or_create -> Channel::attach (lock 2 -> 3)
//! detach      : Channel::detach (lock 2), then release_if_empty (lock 1 -> 2)
//! ```
//!
//! Lookup, creation and removal only happen under lock 1, so a channel that
//! is being released can never be handed to a concurrent attach.
//!
//! There is no global instance: every registry is independent, which keeps
//! tests isolated from each other.

use crate::channel::{Channel, ChannelId, ChannelSnapshot};
use crate::config::{Config, ConfigError};
use crate::error::{Error, Result};
use crate::handle::Handle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ChannelMap = HashMap<ChannelId, Arc<Channel>>;

/// Directory of live channels.
pub struct Registry {
    config: Config,
    channels: Mutex<ChannelMap>,
}

impl Registry {
    /// Create a registry after validating `config`.
    pub fn new(config: Config) -> std::result::Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            channels: Mutex::new(HashMap::new()),
        }))
    }

    /// Registry with default capacity and no limits.
    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self {
            config: Config::default(),
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Configuration applied to new channels.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Attach a new subscriber to the channel named `id`, creating the
    /// channel if needed.
    ///
    /// If the subscriber cannot be created, a channel created by this call
    /// is released again before the error is returned.
    pub fn attach(self: &Arc<Self>, id: impl Into<ChannelId>) -> Result<Handle> {
        let id = id.into();
        let mut channels = self.channels.lock();

        let channel = self.resolve_or_create(&mut channels, &id)?;
        match channel.attach() {
            Ok(subscriber) => Ok(Handle::new(Arc::clone(self), channel, subscriber)),
            Err(err) => {
                log::warn!("[Registry] attach to '{}' failed: {}", id, err);
                Self::release_locked(&mut channels, &channel);
                Err(err)
            }
        }
    }

    /// Existing channel for `id`, or a freshly inserted one.
    ///
    /// Must be called with the registry lock held (`channels` is its guard).
    /// Leaves the map unchanged on failure.
    fn resolve_or_create(&self, channels: &mut ChannelMap, id: &ChannelId) -> Result<Arc<Channel>> {
        if let Some(channel) = channels.get(id) {
            return Ok(Arc::clone(channel));
        }

        if self.config.channel_limit_reached(channels.len()) {
            return Err(Error::ResourceExhausted("channel limit"));
        }
        channels
            .try_reserve(1)
            .map_err(|_| Error::ResourceExhausted("registry"))?;

        let channel = Arc::new(Channel::try_new(id.clone(), &self.config)?);
        channels.insert(id.clone(), Arc::clone(&channel));
        log::debug!(
            "[Registry] created channel '{}' (capacity {})",
            id,
            self.config.capacity
        );
        Ok(channel)
    }

    /// Remove `channel` from the registry if it has no subscribers.
    ///
    /// Returns true if the channel was removed. A different channel that
    /// has since been registered under the same identity is left alone.
    pub fn release_if_empty(&self, channel: &Arc<Channel>) -> bool {
        let mut channels = self.channels.lock();
        Self::release_locked(&mut channels, channel)
    }

    fn release_locked(channels: &mut ChannelMap, channel: &Arc<Channel>) -> bool {
        let registered = channels
            .get(channel.id())
            .is_some_and(|c| Arc::ptr_eq(c, channel));
        if !registered {
            return false;
        }

        // Holding lock 1 while taking lock 2 keeps attach out until removal is done.
        if channel.is_unsubscribed() {
            channels.remove(channel.id());
            log::debug!("[Registry] released channel '{}'", channel.id());
            true
        } else {
            log::trace!(
                "[Registry] channel '{}' still has subscribers",
                channel.id()
            );
            false
        }
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Whether a live channel exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &ChannelId) -> bool {
        self.channels.lock().contains_key(id)
    }

    /// Snapshot of every live channel, sorted by identity.
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        let channels: Vec<Arc<Channel>> = self.channels.lock().values().cloned().collect();
        let mut snapshots: Vec<ChannelSnapshot> = channels.iter().map(|c| c.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("channels", &self.channel_count())
            .finish()
    }
}
