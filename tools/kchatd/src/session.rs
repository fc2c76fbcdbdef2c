// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One client connection bridged to one channel handle.
//!
//! ```text
//!             +-------------- session thread (owns Handle) ---------------+
//! socket --> reader thread --(bounded)--> inbound  --write-->  channel     |
//!             |                                                   |        |
//! socket <--------------------- write_all <--read-- poller doorbell        |
//!             +-----------------------------------------------------------+
//! ```
//!
//! The handle never leaves the session thread. When the channel has no room
//! the session stops taking inbound chunks, the bounded queue fills and the
//! reader thread stops reading the socket, so backpressure reaches the client.
//!
//! A client that disconnects while its bytes wait for room is detached at
//! once and those bytes are dropped. A client that disconnects while the
//! reader thread is itself blocked on a full queue is only noticed once
//! room frees up.

use anyhow::{bail, Context, Result};
use crossbeam::channel::{bounded, Receiver};
use kchat::{Handle, IoMode, Poller, Registry, Token};
use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Longest accepted channel name in bytes.
pub const MAX_CHANNEL_NAME: usize = 255;

const CHANNEL: Token = Token(0);
const CHUNK: usize = 4096;
const INBOUND_DEPTH: usize = 4;

/// Read the `name\n` handshake one byte at a time, so nothing after the
/// newline is consumed.
pub fn read_handshake<R: Read>(stream: &mut R) -> Result<String> {
    let mut name = Vec::with_capacity(64);
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => bail!("connection closed during handshake"),
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if name.len() == MAX_CHANNEL_NAME {
                    bail!("channel name longer than {} bytes", MAX_CHANNEL_NAME);
                }
                name.push(byte[0]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("reading handshake"),
        }
    }
    if name.is_empty() {
        bail!("empty channel name");
    }
    String::from_utf8(name).context("channel name is not UTF-8")
}

/// Serve one connection until the client disconnects.
pub fn serve(mut stream: UnixStream, registry: Arc<Registry>) -> Result<()> {
    let name = match read_handshake(&mut stream) {
        Ok(name) => name,
        Err(e) => {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e);
        }
    };
    let handle = registry
        .attach(name.as_str())
        .with_context(|| format!("attaching to '{}'", name))?;
    info!("client joined '{}' as {}", name, handle.subscriber_id());

    let inbound = spawn_reader(stream.try_clone().context("cloning client socket")?)?;
    let result = pump(&mut stream, handle, inbound);

    let _ = stream.shutdown(Shutdown::Both);
    match &result {
        Ok(()) => info!("client left '{}'", name),
        Err(e) => warn!("session on '{}' ended: {:#}", name, e),
    }
    result
}

/// Receiving side of a client's reader thread.
struct Inbound {
    chunks: Receiver<Vec<u8>>,
    /// Never carries a message; disconnects when the reader thread exits.
    hangup: Receiver<()>,
}

/// Forward socket bytes to the session thread until EOF or error.
fn spawn_reader(mut socket: UnixStream) -> Result<Inbound> {
    let (tx, chunks) = bounded(INBOUND_DEPTH);
    let (hangup_tx, hangup) = bounded::<()>(0);
    thread::Builder::new()
        .name("kchatd-reader".into())
        .spawn(move || {
            let _hangup = hangup_tx;
            let mut buf = [0u8; CHUNK];
            loop {
                match socket.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("socket read failed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("spawning reader thread")?;
    Ok(Inbound { chunks, hangup })
}

/// Session loop: drain the channel to the socket, feed inbound chunks to
/// the channel, then sleep on whichever side can make progress.
fn pump(socket: &mut UnixStream, mut handle: Handle, inbound: Inbound) -> Result<()> {
    let poller = Poller::new();
    let (_, _registration) = handle.poll(&poller, CHANNEL);
    let mut buf = [0u8; CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        loop {
            match handle.read(&mut buf, IoMode::NonBlocking) {
                Ok(n) => socket
                    .write_all(&buf[..n])
                    .context("writing to client")?,
                Err(kchat::Error::WouldBlock) => break,
                Err(e) => return Err(e).context("reading channel"),
            }
        }

        if !pending.is_empty() {
            match handle.write(&pending, IoMode::NonBlocking) {
                Ok(n) => {
                    pending.drain(..n);
                }
                Err(kchat::Error::WouldBlock) => {}
                Err(e) => return Err(e).context("writing channel"),
            }
        }

        if pending.is_empty() {
            crossbeam::select! {
                recv(poller.doorbell()) -> _ => {
                    poller.drain();
                }
                recv(inbound.chunks) -> chunk => match chunk {
                    Ok(chunk) => pending = chunk,
                    Err(_) => break,
                },
            }
        } else {
            // Waiting for room; stop early if the client goes away meanwhile.
            crossbeam::select! {
                recv(poller.doorbell()) -> _ => {
                    poller.drain();
                }
                recv(inbound.hangup) -> _ => {
                    debug!("client gone, dropping {} uncommitted bytes", pending.len());
                    break;
                }
            }
        }
    }

    handle.detach().context("detaching")?;
    Ok(())
}
