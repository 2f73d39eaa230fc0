//! Connection Handling Module
//!
//! Everything that lives for the span of one client connection: its
//! identity, its authentication state, and the task that serves it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + Registration::new()
//!                        ▼
//!           ┌────────────────────────┐      ┌──────────────────┐
//!           │  ConnectionRegistry    │◄────►│   AuthTracker    │
//!           │  (weak session refs)   │      │ (authed ids)     │
//!           └────────────┬───────────┘      └──────────────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Split lines │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping a session's [`Registration`] removes it from the authenticated
//! set and then from the registry, so cleanup happens on every exit path.
//!
//! ## Example
//!
//! ```ignore
//! use blitzdb::connection::{handle_connection, AuthTracker, ConnectionRegistry, ConnectionStats, Registration};
//! use blitzdb::commands::{CommandHandler, CommandRegistry};
//! use blitzdb::protocol::LineParser;
//! use blitzdb::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let auth = Arc::new(AuthTracker::new(None));
//! let connections = Arc::new(ConnectionRegistry::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage, Arc::new(CommandRegistry::new()), Arc::clone(&auth));
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let registration = Registration::new(Arc::clone(&connections), Arc::clone(&auth), addr);
//! tokio::spawn(handle_connection(stream, registration, handler.clone(), LineParser::default(), stats));
//! ```

pub mod auth;
pub mod handler;
pub mod registry;

// Re-export commonly used types
pub use auth::{AuthError, AuthTracker};
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
pub use registry::{ConnectionId, ConnectionRegistry, Registration, SessionHandle};
