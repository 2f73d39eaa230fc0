//! # BlitzDB - A Minimal Networked Key-Value Store
//!
//! BlitzDB is an in-memory key-value server that speaks a line-oriented text
//! protocol over TCP. Each request is one line of space-separated tokens;
//! each reply is one line in a small prefix-typed format.
//!
//! ## Features
//!
//! - **Simple protocol**: `SET foo bar\r\n` in, `+OK\r\n` out
//! - **Binary-safe values**: keys and values are arbitrary bytes
//! - **Optional AUTH**: a configured password unlocks administrative commands
//! - **Async I/O**: Built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              BlitzDB                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │         │                  │                  │                         │
//! │         ▼                  ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────┐     │
//! │  │ Connection  │◄──►│    Auth     │    │      StorageEngine       │     │
//! │  │  Registry   │    │   Tracker   │    │  (single Mutex<HashMap>) │     │
//! │  └─────────────┘    └─────────────┘    └──────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use blitzdb::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `SET key value [NX|XX] [GET] [EX seconds|PX milliseconds]`
//! - `GET key`
//! - `DEL key [key ...]`
//! - `EXISTS key [key ...]`
//! - `DBSIZE`
//! - `FLUSHDB` (requires `AUTH`)
//! - `AUTH password`
//! - `QUIT`
//!
//! ## Module Overview
//!
//! - [`protocol`]: line framing, tokenizing, and reply encoding
//! - [`storage`]: the shared key-value store
//! - [`commands`]: command table and dispatcher
//! - [`connection`]: per-client sessions, identities, and auth state
//! - [`server`]: the listener and its stop handle
//!
//! ## Expiry
//!
//! `SET ... EX`/`PX` records an expiry time, but reads never consult it: an
//! expired key stays visible until something removes it. With
//! [`ServerConfig::active_expiry`] enabled, a background sweeper removes
//! expired entries periodically.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, CommandRegistry};
pub use config::{ConfigError, ServerConfig};
pub use connection::{handle_connection, AuthTracker, ConnectionRegistry, ConnectionStats};
pub use protocol::{LineParser, ParseError, Reply};
pub use server::{Server, ServerError, ServerHandle};
pub use storage::{ExpiryConfig, ExpirySweeper, StorageEngine};

/// The default port BlitzDB listens on
pub const DEFAULT_PORT: u16 = 6379;

/// The default host BlitzDB binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of BlitzDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
