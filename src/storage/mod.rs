//! Storage Engine Module
//!
//! This module provides the key-value store shared by every connection,
//! plus the opt-in background expiry sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               StorageEngine                 │
//! │      Mutex<HashMap<Bytes, Entry>>           │
//! └─────────────────────────────────────────────┘
//!                      ▲
//!                      │ (only with --active-expiry)
//!        ┌─────────────┴─────────────┐
//!        │     ExpirySweeper         │
//!        │  (Background Tokio Task)  │
//!        └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use blitzdb::storage::{SetCondition, SetOutcome, StorageEngine};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"));
//!
//! // NX: only write when the key is absent
//! let outcome = engine.set_with(
//!     Bytes::from("name"),
//!     Bytes::from("Other"),
//!     SetCondition::IfAbsent,
//!     None,
//! );
//! assert_eq!(outcome, SetOutcome::Skipped);
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::{Entry, SetCondition, SetOutcome, StorageEngine, StorageStats};
pub use expiry::{ExpiryConfig, ExpirySweeper};
