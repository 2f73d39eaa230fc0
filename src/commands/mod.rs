//! Command Processing Module
//!
//! This module turns tokenized request lines into replies.
//!
//! ## Architecture
//!
//! ```text
//! Request tokens
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandRegistry │  name → arity / auth metadata (built once)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  validate, check AUTH, execute
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod registry;

pub use handler::{CommandError, CommandHandler, Response};
pub use registry::{CommandKind, CommandRegistry, CommandSpec};
