//! Authentication Tracker
//!
//! Keeps the set of connections that have passed `AUTH`. A connection starts
//! unauthenticated, is added by a successful `AUTH`, and is removed when it
//! disconnects. The set has its own lock, separate from the store and the
//! connection registry.

use crate::connection::registry::ConnectionId;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Why an `AUTH` attempt was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid password")]
    InvalidPassword,

    #[error("no password is configured")]
    NotConfigured,
}

/// The configured secret and the connections that presented it.
#[derive(Debug)]
pub struct AuthTracker {
    password: Option<Vec<u8>>,
    authenticated: Mutex<HashSet<ConnectionId>>,
}

impl AuthTracker {
    /// Creates a tracker. With `None`, every `AUTH` attempt is refused.
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.map(String::into_bytes),
            authenticated: Mutex::new(HashSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ConnectionId>> {
        self.authenticated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn password_required(&self) -> bool {
        self.password.is_some()
    }

    /// Checks `candidate` against the configured secret and, on a match,
    /// marks `id` as authenticated. A failed attempt leaves the current
    /// state of `id` untouched.
    pub fn authenticate(&self, id: ConnectionId, candidate: &[u8]) -> Result<(), AuthError> {
        let password = self.password.as_deref().ok_or(AuthError::NotConfigured)?;
        if password != candidate {
            return Err(AuthError::InvalidPassword);
        }

        self.lock().insert(id);
        Ok(())
    }

    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.lock().contains(&id)
    }

    /// Forgets `id`. Returns whether it was authenticated.
    pub fn revoke(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id)
    }

    /// Number of currently authenticated connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
