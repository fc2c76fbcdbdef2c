// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket listener: accepts clients and spawns one session thread each.

use crate::session;
use anyhow::{Context, Result};
use kchat::{ChannelSnapshot, Registry};
use std::io::ErrorKind;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Listening daemon.
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
    stats_interval: Option<Duration>,
}

impl Server {
    /// Bind `socket_path`, replacing a stale socket file left by a previous run.
    pub fn bind(socket_path: &Path, registry: Arc<Registry>, stats_interval_secs: u64) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("removing stale socket {}", socket_path.display()))?;
        }
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("binding {}", socket_path.display()))?;
        listener
            .set_nonblocking(true)
            .context("setting listener non-blocking")?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            registry,
            running: Arc::new(AtomicBool::new(true)),
            stats_interval: (stats_interval_secs > 0).then(|| Duration::from_secs(stats_interval_secs)),
        })
    }

    /// Flag that stops [`Server::run`] when cleared.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept clients until the running flag is cleared.
    pub fn run(&self) -> Result<()> {
        info!("listening on {}", self.socket_path.display());
        let mut last_report = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    // Sessions use blocking I/O.
                    stream
                        .set_nonblocking(false)
                        .context("setting client socket blocking")?;
                    let registry = Arc::clone(&self.registry);
                    thread::Builder::new()
                        .name("kchatd-session".into())
                        .spawn(move || {
                            if let Err(e) = session::serve(stream, registry) {
                                debug!("session closed: {:#}", e);
                            }
                        })
                        .context("spawning session thread")?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => error!("accept failed: {}", e),
            }

            if let Some(interval) = self.stats_interval {
                if last_report.elapsed() >= interval {
                    report_stats(&self.registry.snapshot());
                    last_report = Instant::now();
                }
            }
        }
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("removing {}: {}", self.socket_path.display(), e);
        }
    }
}

/// Log one line per live channel.
pub fn report_stats(channels: &[ChannelSnapshot]) {
    if channels.is_empty() {
        info!("stats: no active channels");
        return;
    }
    for ch in channels {
        info!(
            "stats: '{}' subscribers={} backlog={}/{} written={}B read={}B would_block={} interrupted={}",
            ch.id,
            ch.subscribers,
            ch.backlog,
            ch.capacity,
            ch.stats.bytes_written,
            ch.stats.bytes_read,
            ch.stats.would_block,
            ch.stats.interrupted
        );
    }
}
