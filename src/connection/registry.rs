//! Active Connection Registry
//!
//! The listener needs to find every live session when the server stops, but
//! it must never keep a session alive or delay its cleanup. Each session
//! therefore owns an `Arc<SessionHandle>`, and the registry only keeps a
//! `Weak` to it, keyed by the session's [`ConnectionId`].
//!
//! ```text
//!  Session task ──owns──> Registration ──Arc──> SessionHandle
//!                                                    ▲
//!  ConnectionRegistry ──────────Weak─────────────────┘
//! ```
//!
//! Closing a handle flips a `watch` flag the session selects on; the session
//! then drops its socket. When the session ends, dropping its
//! [`Registration`] removes the identity from both the registry and the
//! authenticated set.

use crate::connection::auth::AuthTracker;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::debug;

/// Stable identity of one accepted connection.
///
/// Identities come from a monotonically increasing counter and are never
/// reused for a different connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The part of a session the registry can reach.
#[derive(Debug)]
pub struct SessionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl SessionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Asks the session to drop its socket. Pending reads and writes are
    /// abandoned.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closing(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Weak references to every live session.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<ConnectionId, Weak<SessionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Weak<SessionHandle>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a fresh identity for `peer` and records a weak reference to
    /// its handle. The caller receives the only strong reference.
    pub fn register(&self, peer: SocketAddr) -> (Arc<SessionHandle>, watch::Receiver<bool>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = Arc::new(SessionHandle { id, peer, shutdown });

        self.lock().insert(id, Arc::downgrade(&handle));
        (handle, shutdown_rx)
    }

    /// Removes an identity. Returns `false` if it was already gone (for
    /// example because the registry was cleared by `close_all`).
    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of registered sessions that are still alive.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|session| session.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every session that is still reachable and clears the registry.
    ///
    /// Handles whose session has already ended, or was already asked to
    /// close, are skipped. The registry lock is released before any session
    /// is signalled.
    ///
    /// # Returns
    ///
    /// Returns the number of sessions that were signalled.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(ConnectionId, Weak<SessionHandle>)> = self.lock().drain().collect();

        let mut closed = 0;
        for (id, session) in drained {
            match session.upgrade() {
                Some(handle) if handle.is_closing() => {
                    debug!(conn = %id, "Skipping connection that is already closing")
                }
                Some(handle) => {
                    debug!(conn = %id, client = %handle.peer(), "Closing connection");
                    handle.close();
                    closed += 1;
                }
                None => debug!(conn = %id, "Skipping connection that already ended"),
            }
        }
        closed
    }
}

/// Ties a session's lifetime to its bookkeeping.
///
/// Created by the listener when a socket is accepted and owned by the
/// session. Dropping it removes the identity from the authenticated set and
/// then from the registry, one lock at a time.
#[derive(Debug)]
pub struct Registration {
    handle: Arc<SessionHandle>,
    shutdown: watch::Receiver<bool>,
    connections: Arc<ConnectionRegistry>,
    auth: Arc<AuthTracker>,
}

impl Registration {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        auth: Arc<AuthTracker>,
        peer: SocketAddr,
    ) -> Self {
        let (handle, shutdown) = connections.register(peer);
        Self {
            handle,
            shutdown,
            connections,
            auth,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn peer(&self) -> SocketAddr {
        self.handle.peer()
    }

    /// A receiver that resolves once the session has been asked to close.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let id = self.handle.id();
        self.auth.revoke(id);
        self.connections.deregister(id);
    }
}
