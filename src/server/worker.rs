//! The connection worker.
//!
//! A worker owns exactly one connection at a time and drives the full cycle
//! for it: read bytes into its parser, decode a batch of commands, execute
//! each one under the cache lock, and write the concatenated replies in a
//! single call. Workers block on the shared connection channel between
//! clients, so a fixed pool of them serves the whole process.
//!
//! ## Per-connection state machine
//!
//! ```text
//!  start
//!    │
//!    ▼
//!  (arm deadline) ── shutdown signaled ──▶ CLOSE
//!    │
//!    ▼
//!  read ── connection error / deadline ──▶ CLOSE
//!    │         oversize ──▶ reply error ─▶ reset parser ─▶ read
//!    ▼
//!  parse ── frame incomplete ──▶ read
//!    │        oversize      ──▶ reply error ─▶ reset parser ─▶ read
//!    │        malformed     ──▶ reply error ─▶ CLOSE
//!    ▼
//!  execute batch under lock, concatenating replies
//!    │
//!    ▼
//!  write replies ── error ──▶ CLOSE
//!    │
//!    ▼
//!  (re-arm deadline) ─▶ read
//! ```
//!
//! Failures of individual commands (unknown name, wrong arity, missing key,
//! type mismatch) become RESP errors *inside* the batch reply; the
//! connection keeps going. Only connection errors, the idle deadline, a
//! malformed frame, and the shutdown signal end it.

use crate::commands::{Command, CommandError};
use crate::protocol::{CommandArgs, ParseError, Reply, RespParser};
use crate::storage::Cache;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::ConnectionQueue;

/// A pool worker: one parser, one shared cache handle, one connection at a
/// time.
#[derive(Debug)]
pub struct Worker {
    id: u64,
    cache: Arc<Mutex<Cache>>,
    parser: RespParser,
    idle_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Creates a worker. `max_command_size` bounds a single framed command;
    /// `idle_timeout` is the per-connection inactivity deadline.
    pub fn new(
        id: u64,
        cache: Arc<Mutex<Cache>>,
        max_command_size: usize,
        idle_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            cache,
            parser: RespParser::new(max_command_size),
            idle_timeout,
            shutdown,
        }
    }

    /// Serves connections from the shared channel until it closes.
    pub async fn run(mut self, connections: ConnectionQueue) {
        info!(worker = self.id, "worker started");
        loop {
            // Only idle workers contend on this lock; it is released before
            // the connection is served.
            let accepted = { connections.lock().await.recv().await };
            let Some((stream, addr)) = accepted else {
                break;
            };
            info!(worker = self.id, client = %addr, "client connected");
            self.handle_connection(stream).await;
            info!(worker = self.id, client = %addr, "client disconnected");
        }
        debug!(worker = self.id, "connection channel closed, stopping");
    }

    /// Answers a single client until the connection closes, the idle
    /// deadline passes, or shutdown is signaled.
    ///
    /// Generic over the stream so tests can drive it with an in-memory
    /// duplex pipe instead of a TCP socket.
    pub async fn handle_connection<S>(&mut self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.parser.reset();
        let mut deadline = Instant::now() + self.idle_timeout;

        loop {
            // Cooperative cancellation point, once per iteration: an
            // in-flight read/parse/reply completes before we let go.
            if *self.shutdown.borrow() {
                debug!(worker = self.id, "shutdown signaled, finishing connection");
                return;
            }

            match timeout_at(deadline, self.parser.read_from(&mut stream)).await {
                Err(_) => {
                    debug!(worker = self.id, "connection idle past the deadline");
                    return;
                }
                Ok(Err(e)) if e.is_connection_related() => {
                    debug!(worker = self.id, reason = %e, "connection closed");
                    return;
                }
                Ok(Err(e)) => {
                    // Oversize is the only other failure a read produces.
                    if self.reject_oversize(&mut stream, &e).await.is_err() {
                        return;
                    }
                    continue;
                }
                Ok(Ok(_)) => {}
            }

            let commands = match self.parser.parse_command() {
                Ok(commands) => commands,
                Err(ParseError::BufferExhausted) => continue,
                Err(e @ ParseError::ExceededMaxSize) => {
                    if self.reject_oversize(&mut stream, &e).await.is_err() {
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(worker = self.id, error = %e, "malformed frame, closing connection");
                    let _ = self.write_reply(&mut stream, &Reply::error(e.to_string())).await;
                    return;
                }
            };

            let mut response = Vec::new();
            for args in commands {
                match self.execute(args) {
                    Ok(reply) => reply.serialize_into(&mut response),
                    Err(e) => {
                        debug!(worker = self.id, error = %e, "command failed");
                        Reply::error(e.to_string()).serialize_into(&mut response);
                    }
                }
            }

            if let Err(e) = self.write_all(&mut stream, &response).await {
                debug!(worker = self.id, error = %e, "failed to write response");
                return;
            }
            deadline = Instant::now() + self.idle_timeout;
        }
    }

    /// Binds and runs one command. The cache lock is held only for `apply`,
    /// never across socket IO.
    fn execute(&self, args: CommandArgs) -> Result<Reply, CommandError> {
        let command = Command::bind(args)?;
        let mut cache = self.cache.lock().unwrap();
        command.apply(&mut cache)
    }

    /// Rejects an oversize command: error reply, then a clean parser so the
    /// same connection can keep issuing commands that fit.
    async fn reject_oversize<S>(&mut self, stream: &mut S, error: &ParseError) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        warn!(worker = self.id, "command exceeded the size bound");
        let result = self.write_reply(stream, &Reply::error(error.to_string())).await;
        self.parser.reset();
        result
    }

    async fn write_reply<S>(&mut self, stream: &mut S, reply: &Reply) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let bytes = reply.serialize();
        self.write_all(stream, &bytes).await
    }

    async fn write_all<S>(&mut self, stream: &mut S, bytes: &[u8]) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(bytes).await?;
        stream.flush().await
    }
}
