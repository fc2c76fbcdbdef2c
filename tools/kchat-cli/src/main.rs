// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! kchat: interactive client for a kchatd channel.
//!
//! Lines typed on stdin are sent to the channel; everything the channel
//! carries (including our own lines) is printed to stdout.
//!
//! ```bash
//! kchat lobby
//! kchat lobby --socket /run/kchat.sock
//! echo "hello" | kchat lobby
//! ```

use clap::Parser;
use mio::net::UnixStream;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::error::Error;
use std::io::{self, BufRead, ErrorKind, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

const STDIN: Token = Token(0);
const SOCKET: Token = Token(1);

const MAX_CHANNEL_NAME: usize = 255;
/// Stop reading stdin while this much output is waiting for the socket.
const MAX_PENDING: usize = 64 * 1024;

/// kchat channel client
#[derive(Parser, Debug)]
#[command(name = "kchat")]
#[command(about = "Chat on a kchatd broadcast channel")]
#[command(version)]
struct Args {
    /// Channel name
    channel: String,

    /// kchatd socket path
    #[arg(short, long, default_value = "/tmp/kchat.sock")]
    socket: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("kchat: {}", e);
        std::process::exit(1);
    }
}

/// Handshake line for `channel`.
fn handshake(channel: &str) -> io::Result<Vec<u8>> {
    if channel.is_empty() || channel.len() > MAX_CHANNEL_NAME || channel.contains('\n') {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("channel name must be 1..={} bytes without newlines", MAX_CHANNEL_NAME),
        ));
    }
    let mut line = Vec::with_capacity(channel.len() + 1);
    line.extend_from_slice(channel.as_bytes());
    line.push(b'\n');
    Ok(line)
}

/// Bytes waiting to be written to a non-blocking sink.
#[derive(Debug, Default)]
struct Outbox {
    buf: Vec<u8>,
}

impl Outbox {
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write as much as the sink accepts. Returns true once empty.
    fn flush_to<W: Write>(&mut self, sink: &mut W) -> io::Result<bool> {
        while !self.buf.is_empty() {
            match sink.write(&self.buf) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.buf.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let line = handshake(&args.channel)?;

    // Connect and send the handshake in blocking mode, then hand the socket to mio.
    let mut std_stream = std::os::unix::net::UnixStream::connect(&args.socket)
        .map_err(|e| format!("connecting to {}: {}", args.socket.display(), e))?;
    std_stream.write_all(&line)?;
    std_stream.set_nonblocking(true)?;
    let mut stream = UnixStream::from_std(std_stream);
    log::debug!("joined '{}' via {}", args.channel, args.socket.display());

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(16);
    poll.registry()
        .register(&mut stream, SOCKET, Interest::READABLE)?;

    let stdin = io::stdin();
    let stdin_fd = stdin.as_raw_fd();
    poll.registry()
        .register(&mut SourceFd(&stdin_fd), STDIN, Interest::READABLE)
        .map_err(|e| format!("stdin cannot be polled: {}", e))?;
    let mut stdin_open = true;
    let mut stdin_paused = false;

    let mut outbox = Outbox::default();
    let mut stdout = io::stdout();
    let mut buf = [0u8; 4096];

    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                STDIN if stdin_open => {
                    if outbox.len() >= MAX_PENDING {
                        stdin_paused = true;
                        continue;
                    }
                    let mut input = stdin.lock();
                    let data = input.fill_buf()?;
                    if data.is_empty() {
                        log::debug!("stdin closed, receive only");
                        stdin_open = false;
                        poll.registry().deregister(&mut SourceFd(&stdin_fd))?;
                        continue;
                    }
                    outbox.push(data);
                    let n = data.len();
                    input.consume(n);
                    drop(input);

                    // Re-arm: data left in the pipe is reported again.
                    poll.registry()
                        .reregister(&mut SourceFd(&stdin_fd), STDIN, Interest::READABLE)?;
                }
                SOCKET => {
                    if event.is_readable() && !drain_socket(&mut stream, &mut stdout, &mut buf)? {
                        log::debug!("server closed the connection");
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        if !outbox.is_empty() {
            outbox.flush_to(&mut stream)?;
        }
        let interest = if outbox.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };
        poll.registry().reregister(&mut stream, SOCKET, interest)?;

        if stdin_paused && outbox.len() < MAX_PENDING {
            stdin_paused = false;
            poll.registry()
                .reregister(&mut SourceFd(&stdin_fd), STDIN, Interest::READABLE)?;
        }
    }
}

/// Copy everything readable from the socket to `out`.
///
/// Returns false once the peer has closed the connection.
fn drain_socket<R: Read, W: Write>(socket: &mut R, out: &mut W, buf: &mut [u8]) -> io::Result<bool> {
    loop {
        match socket.read(buf) {
            Ok(0) => {
                out.flush()?;
                return Ok(false);
            }
            Ok(n) => out.write_all(&buf[..n])?,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    out.flush()?;
    Ok(true)
}
