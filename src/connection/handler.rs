//! Connection Handler
//!
//! Each client connection runs in its own task:
//!
//! ```text
//!   read ──> inbound ──parse──> Command ──execute──> outbound ──flush──┐
//!    ▲                                                                 │
//!    └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every complete request already buffered is answered before the next read,
//! and the replies for that batch go out in one write. Requests on one
//! connection are answered in order. A connection that sends nothing for
//! `idle_timeout` is closed.

use crate::commands::{Command, CommandHandler};
use crate::protocol::{parse_request, ParseError, RespValue};
use bytes::{Buf, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, trace, warn};

/// Upper bound on unparsed bytes held for one client (room for one maximal
/// bulk string plus framing).
const MAX_INBOUND: usize = 2 * 1024 * 1024;

/// Bytes reserved ahead of each socket read.
const READ_CHUNK: usize = 4096;

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Connections accepted since startup
    pub accepted: AtomicU64,
    /// Connections currently open
    pub active: AtomicU64,
    /// Commands answered
    pub commands: AtomicU64,
    /// Connections closed after `idle_timeout` of silence
    pub idle_closed: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Reasons a connection ends other than the client leaving cleanly.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The client sent bytes that are not a request
    #[error("malformed request: {0}")]
    Protocol(#[from] ParseError),

    /// The client hung up in the middle of a request
    #[error("connection closed with {0} bytes of an unfinished request")]
    Truncated(usize),

    #[error("request buffer reached {0} bytes without a complete request")]
    Overflow(usize),

    /// Nothing received for the idle timeout
    #[error("no data received for {0:?}")]
    Idle(Duration),
}

/// One client session.
pub struct ConnectionHandler {
    socket: TcpStream,
    peer: SocketAddr,
    inbound: BytesMut,
    outbound: BytesMut,
    commands: CommandHandler,
    idle_timeout: Duration,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        socket: TcpStream,
        peer: SocketAddr,
        commands: CommandHandler,
        idle_timeout: Duration,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            socket,
            peer,
            inbound: BytesMut::with_capacity(READ_CHUNK),
            outbound: BytesMut::new(),
            commands,
            idle_timeout,
            stats,
        }
    }

    /// Serves the client until it leaves, quits, idles out or misbehaves.
    ///
    /// A client closing the socket between requests is `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        self.stats.opened();
        info!(peer = %self.peer, "Client connected");

        let outcome = self.serve().await;
        self.stats.closed();

        match &outcome {
            Ok(()) => info!(peer = %self.peer, "Client disconnected"),
            Err(ConnectionError::Idle(after)) => {
                self.stats.idle_closed.fetch_add(1, Ordering::Relaxed);
                debug!(peer = %self.peer, idle = ?after, "Closed idle connection");
            }
            Err(ConnectionError::Io(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
                debug!(peer = %self.peer, "Connection reset by peer");
            }
            Err(e) => warn!(peer = %self.peer, error = %e, "Connection closed with error"),
        }

        outcome
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let quit = self.answer_buffered().await;
            // Replies queued before a failure still go out.
            self.flush_replies().await?;
            if quit? {
                return Ok(());
            }

            if !self.fill_inbound().await? {
                return Ok(());
            }
        }
    }

    /// Executes every complete request in `inbound`, queueing the replies.
    ///
    /// Returns true once the client has asked to quit; anything it pipelined
    /// after `QUIT` is ignored.
    async fn answer_buffered(&mut self) -> Result<bool, ConnectionError> {
        loop {
            let (request, consumed) = match parse_request(&self.inbound) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => return Ok(false),
                Err(e) => {
                    RespValue::error(format!("ERR Protocol error: {}", e))
                        .encode(&mut self.outbound);
                    return Err(e.into());
                }
            };
            self.inbound.advance(consumed);
            trace!(peer = %self.peer, consumed, "Parsed request");

            let reply = match Command::from_request(request) {
                Ok(command) => {
                    let quit = command == Command::Quit;
                    let reply = self.commands.execute(command).await;
                    self.stats.commands.fetch_add(1, Ordering::Relaxed);
                    if quit {
                        reply.encode(&mut self.outbound);
                        return Ok(true);
                    }
                    reply
                }
                Err(rejection) => rejection,
            };
            reply.encode(&mut self.outbound);
        }
    }

    /// Reads from the socket into `inbound`.
    ///
    /// Returns false if the client closed the socket between requests.
    async fn fill_inbound(&mut self) -> Result<bool, ConnectionError> {
        if self.inbound.len() >= MAX_INBOUND {
            return Err(ConnectionError::Overflow(self.inbound.len()));
        }
        self.inbound.reserve(READ_CHUNK);

        let idle = self.idle_timeout;
        let n = match time::timeout(idle, self.socket.read_buf(&mut self.inbound)).await {
            Ok(read) => read?,
            Err(_) => return Err(ConnectionError::Idle(idle)),
        };

        if n > 0 {
            trace!(peer = %self.peer, bytes = n, "Read from socket");
            Ok(true)
        } else if self.inbound.is_empty() {
            Ok(false)
        } else {
            Err(ConnectionError::Truncated(self.inbound.len()))
        }
    }

    async fn flush_replies(&mut self) -> Result<(), ConnectionError> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        self.socket.write_all(&self.outbound).await?;
        self.outbound.clear();
        Ok(())
    }
}

/// Runs a client connection to completion.
pub async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    commands: CommandHandler,
    idle_timeout: Duration,
    stats: Arc<ConnectionStats>,
) {
    // The outcome is logged by `run`.
    let _ = ConnectionHandler::new(socket, peer, commands, idle_timeout, stats)
        .run()
        .await;
}
