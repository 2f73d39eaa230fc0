//! Server Module
//!
//! Binds the listening socket and runs the accept loop.
//!
//! ## Example
//!
//! ```ignore
//! use blitzdb::{Server, ServerConfig};
//!
//! let server = Server::bind(ServerConfig::default()).await?;
//! let handle = server.handle();
//!
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.stop();
//! });
//!
//! server.run().await;
//! ```

pub mod listener;

pub use listener::{Server, ServerError, ServerHandle};
