//! # driftkv - a lightweight in-memory RESP cache
//!
//! driftkv is an embeddable key/value cache with list primitives, speaking a
//! subset of the RESP (REdis Serialization Protocol) wire format over TCP.
//! Clients send commands as RESP arrays of bulk strings; the server parses,
//! executes against shared state, and answers with RESP replies.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          driftkv                             │
//! │                                                              │
//! │  ┌──────────┐   bounded    ┌──────────┐    ┌──────────────┐  │
//! │  │ Listener │── channel ──▶│ Worker N │───▶│  RespParser  │  │
//! │  └──────────┘              └────┬─────┘    │ (per worker) │  │
//! │                                 │          └──────────────┘  │
//! │                                 ▼                            │
//! │                       ┌──────────────────┐                   │
//! │                       │ Mutex<Cache>     │                   │
//! │                       │ strings + lists  │                   │
//! │                       └──────────────────┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline per connection is
//! `TCP bytes → parser accumulator → parsed arrays → bound commands →
//! cache mutation under the lock → RESP replies → TCP bytes`.
//!
//! A fixed pool of workers each owns one connection at a time; parsers are
//! never shared, the cache always is. The parser is a resumable byte-level
//! state machine, so commands may be fragmented at any byte boundary across
//! reads, and a single read may carry many pipelined commands.
//!
//! ## Quick start
//!
//! ```ignore
//! use driftkv::server::Server;
//! use std::time::Duration;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!     let server = Server::new(listener, 8, 10 * 1024, Duration::from_secs(60));
//!     server.run(async {
//!         tokio::signal::ctrl_c().await.unwrap();
//!     }).await;
//! }
//! ```
//!
//! ## Supported commands
//!
//! - `SET key value` / `GET key`
//! - `LPUSH key value [value ...]` / `RPUSH key value [value ...]`
//! - `LPOP key` / `RPOP key`
//! - `LINDEX key index`
//!
//! ## Module overview
//!
//! - [`protocol`]: the incremental RESP parser and reply encoding
//! - [`storage`]: the mutex-shared cache engine
//! - [`commands`]: binding parsed arrays to cache operations
//! - [`server`]: the listener, the worker pool, and graceful shutdown

pub mod commands;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::{Command, CommandError};
pub use protocol::{ParseError, Reply, RespParser};
pub use server::{Server, Worker};
pub use storage::{Cache, CacheError};

/// The default host the server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default port the server listens on.
pub const DEFAULT_PORT: u16 = 6379;

/// The default number of pool workers.
pub const DEFAULT_WORKERS: usize = 8;

/// The default per-connection idle timeout, in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Version of driftkv.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
