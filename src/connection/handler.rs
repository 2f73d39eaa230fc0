//! Connection Handler Module
//!
//! This module handles individual client connections to BlitzDB.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, listener registers it
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  Await a full line ──────────┼──> peer closed / read error ─┐
//!    │        │                     │                              │
//!    │        ▼ (empty → skip)      │                              │
//!    │  Tokenize + dispatch         │                              │
//!    │        │                     │                              │
//!    │        ▼                     │                              │
//!    │  Write reply ────────────────┼──> write error / QUIT ───────┤
//!    │        │                     │                              │
//!    │   [Loop back]                │                              │
//!    └──────────────────────────────┘                              │
//!                                                                  ▼
//! 3. Closing: leave the authenticated set and the registry, drop the socket
//! ```
//!
//! The whole loop races against the session's shutdown signal, so
//! `Server::stop` interrupts a pending read or write immediately.
//!
//! ## Ordering
//!
//! Several lines may arrive in one TCP segment. They are handled strictly in
//! order, and the reply to one line is flushed before the next is parsed.

use crate::commands::CommandHandler;
use crate::connection::registry::{ConnectionId, Registration};
use crate::protocol::{tokenize, LineParser, ParseError, Reply};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so it can run on a `TcpStream` or on an
/// in-memory stream in tests.
pub struct ConnectionHandler<S> {
    // Declared first so the identity is released before the socket closes
    registration: Registration,

    /// The client stream, buffered for writes
    stream: BufWriter<S>,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared state behind Arcs)
    command_handler: CommandHandler,

    /// Line framing
    parser: LineParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `registration` - This connection's identity and shutdown signal
    /// * `command_handler` - The command handler for executing commands
    /// * `parser` - Line framing with the configured length limit
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        registration: Registration,
        command_handler: CommandHandler,
        parser: LineParser,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            registration,
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser,
            stats,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.registration.id()
    }

    fn addr(&self) -> SocketAddr {
        self.registration.peer()
    }

    /// Runs the connection until the client leaves, an I/O error occurs, or
    /// the server asks it to close.
    ///
    /// Consumes the handler; when this returns the socket is closed and the
    /// connection is gone from the registry and the authenticated set.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let (id, addr) = (self.id(), self.addr());
        info!(client = %addr, conn = %id, "Client connected");

        let mut shutdown = self.registration.shutdown_signal();
        let result = tokio::select! {
            result = self.main_loop() => result,
            _ = async { shutdown.wait_for(|closing| *closing).await.map(drop) } => {
                Err(ConnectionError::Shutdown)
            }
        };

        match &result {
            Ok(()) => info!(client = %addr, conn = %id, "Client disconnected gracefully"),
            Err(ConnectionError::Shutdown) => {
                debug!(client = %addr, conn = %id, "Connection closed by server shutdown")
            }
            Err(e) if e.is_peer_close() => {
                debug!(client = %addr, conn = %id, reason = %e, "Client disconnected")
            }
            Err(e) => warn!(client = %addr, conn = %id, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.parser.parse(&mut self.buffer)? {
                if line.is_empty() {
                    continue;
                }

                let response = self.process_line(&line);
                let written = self.send_reply(&response.reply).await;

                if response.close {
                    if let Err(e) = written {
                        debug!(client = %self.addr(), error = %e, "Failed to write QUIT reply");
                    }
                    return Ok(());
                }
                written?;
            }

            self.read_more_data().await?;
        }
    }

    /// Tokenizes and executes one non-empty request line.
    fn process_line(&self, line: &Bytes) -> crate::commands::Response {
        let tokens = tokenize(line);
        let response = self.command_handler.execute(self.id(), &tokens);
        self.stats.command_processed();

        trace!(
            client = %self.addr(),
            tokens = tokens.len(),
            reply = %response.reply,
            "Executed command"
        );
        response
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr(), bytes = n, "Read data");

        Ok(())
    }

    /// Sends a reply to the client and flushes it.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr(),
            bytes = bytes.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Request framing error
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial line)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The server is stopping
    #[error("Server shutting down")]
    Shutdown,
}

impl ConnectionError {
    /// Whether the peer simply went away, as opposed to a fault on our side
    /// or a protocol violation.
    pub fn is_peer_close(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected | ConnectionError::UnexpectedEof => true,
            ConnectionError::IoError(e) => e.kind() == std::io::ErrorKind::ConnectionReset,
            ConnectionError::ParseError(_) | ConnectionError::Shutdown => false,
        }
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    registration: Registration,
    command_handler: CommandHandler,
    parser: LineParser,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, registration, command_handler, parser, stats);
    // run() already logs how the connection ended
    let _ = handler.run().await;
}
