// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! kchatd: hosts broadcast chat channels behind a Unix domain socket.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: /tmp/kchat.sock, 2048-byte channels
//! kchatd
//!
//! # Custom socket and capacity
//! kchatd --socket /run/kchat.sock --capacity 4096
//!
//! # Using configuration file
//! kchatd --config kchatd.toml
//!
//! # Write an example configuration
//! kchatd gen-config --output kchatd.toml
//! ```
//!
//! Clients connect, send a channel name terminated by a newline, then
//! exchange raw bytes with every other client on that channel.

mod config;
mod server;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DaemonConfig;
use kchat::Registry;
use server::Server;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// kchat channel host
#[derive(Parser, Debug)]
#[command(name = "kchatd")]
#[command(about = "Hosts kchat broadcast channels behind a Unix domain socket")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path (overrides the configuration file)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Channel buffer capacity in bytes (overrides the configuration file)
    #[arg(long)]
    capacity: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long)]
    stats_interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "kchatd.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let mut args = Args::parse();

    if let Some(cmd) = args.command.take() {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let registry = Registry::new(config.channel.clone()).context("invalid channel settings")?;
    let server = Server::bind(
        &config.socket_path,
        Arc::clone(&registry),
        config.stats_interval_secs,
    )?;

    let running = server.running();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    info!("kchatd v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "channel capacity {} bytes, socket {}",
        config.channel.capacity,
        server.socket_path().display()
    );
    info!("Press Ctrl+C to stop...");

    server.run()?;
    info!("shutting down");
    let live = registry.channel_count();
    if live > 0 {
        warn!("{} channel(s) still have connected clients", live);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match args.config {
        Some(ref path) => DaemonConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DaemonConfig::default(),
    };

    if let Some(ref socket) = args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(capacity) = args.capacity {
        config.channel.capacity = capacity;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    if let Some(interval) = args.stats_interval {
        config.stats_interval_secs = interval;
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    std::fs::write(&output, DaemonConfig::example())
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Generated configuration: {}", output.display());
    Ok(())
}

fn cmd_validate(path: PathBuf) -> Result<()> {
    let config = DaemonConfig::from_file(&path)
        .with_context(|| format!("validating {}", path.display()))?;
    println!("Configuration valid: {}", path.display());
    println!("  Socket:   {}", config.socket_path.display());
    println!("  Capacity: {} bytes", config.channel.capacity);
    if let Some(max) = config.channel.max_channels {
        println!("  Max channels:    {}", max);
    }
    if let Some(max) = config.channel.max_subscribers {
        println!("  Max subscribers: {}", max);
    }
    Ok(())
}
