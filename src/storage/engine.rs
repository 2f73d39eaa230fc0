//! Thread-Safe Storage Engine
//!
//! This module implements the key-value store shared by every connection.
//!
//! ## Design Decisions
//!
//! 1. **One Mutex**: The whole map sits behind a single `Mutex`. Every
//!    operation holds it for its full duration, so no caller can observe a
//!    partially applied write.
//! 2. **Expiry is bookkeeping only**: Entries carry an optional expiry
//!    `Instant`, but `get` and `exists` never look at it. Stale entries are
//!    only removed by [`StorageEngine::cleanup_expired`], which the opt-in
//!    sweeper calls.
//! 3. **Conditional writes in one step**: `SET ... NX|XX|GET` runs through
//!    [`StorageEngine::set_with`], which checks the precondition, writes,
//!    applies expiry and captures the previous value under one lock.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ Connection 1 │  │ Connection 2 │  │   Sweeper    │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │                 │                 │
//!        ▼                 ▼                 ▼
//! ┌─────────────────────────────────────────────────┐
//! │        Mutex<HashMap<Bytes, Entry>>             │
//! └─────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry becomes stale (None = never)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Whether the expiry time has passed at `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// Precondition for a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    /// Unconditional upsert
    #[default]
    Always,
    /// Only write if the key is absent (NX)
    IfAbsent,
    /// Only write if the key is present (XX)
    IfPresent,
}

/// Result of [`StorageEngine::set_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was written; carries the value it replaced, if any.
    Written { previous: Option<Bytes> },
    /// The precondition failed and nothing was written.
    Skipped,
}

/// Operation counters, see [`StorageEngine::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
}

/// The key-value store.
///
/// Wrap it in an `Arc` and share it across all connection tasks. All
/// operations are thread-safe and atomic with respect to each other.
///
/// # Example
///
/// ```
/// use blitzdb::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
///
/// assert!(engine.delete(b"name"));
/// assert!(!engine.delete(b"name"));
/// ```
pub struct StorageEngine {
    data: Mutex<HashMap<Bytes, Entry>>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    // Every method leaves the map consistent before it can panic, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, HashMap<Bytes, Entry>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a key-value pair, replacing any existing value and expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(key, Entry::new(value));
    }

    /// Conditional write used by `SET` with options.
    ///
    /// Checks `condition`, writes `value` (dropping any previous expiry),
    /// then records `expires_at` if given. The returned outcome carries the
    /// replaced value so `SET ... GET` can report it.
    pub fn set_with(
        &self,
        key: Bytes,
        value: Bytes,
        condition: SetCondition,
        expires_at: Option<Instant>,
    ) -> SetOutcome {
        let mut data = self.lock();

        let present = data.contains_key(&key);
        let blocked = match condition {
            SetCondition::Always => false,
            SetCondition::IfAbsent => present,
            SetCondition::IfPresent => !present,
        };
        if blocked {
            return SetOutcome::Skipped;
        }

        self.set_count.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            value,
            expires_at,
        };
        let previous = data.insert(key, entry).map(|old| old.value);

        SetOutcome::Written { previous }
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key was never set or has been deleted. The
    /// expiry time is not consulted.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.lock().get(key).map(|entry| entry.value.clone())
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.lock().remove(key).is_some()
    }

    /// Deletes multiple keys under a single lock acquisition.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were actually removed.
    pub fn delete_many(&self, keys: &[Bytes]) -> u64 {
        self.del_count
            .fetch_add(keys.len() as u64, Ordering::Relaxed);

        let mut data = self.lock();
        keys.iter().filter(|key| data.remove(*key).is_some()).count() as u64
    }

    /// Checks if a key exists. The expiry time is not consulted.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.lock().contains_key(key)
    }

    /// Counts how many of the given keys exist.
    pub fn exists_many(&self, keys: &[Bytes]) -> u64 {
        let data = self.lock();
        keys.iter().filter(|key| data.contains_key(*key)).count() as u64
    }

    /// Records the time after which `key` is considered stale.
    ///
    /// # Returns
    ///
    /// Returns `true` if the expiry was recorded, `false` if the key doesn't exist.
    pub fn set_expiry(&self, key: &[u8], at: Instant) -> bool {
        match self.lock().get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Returns the recorded expiry time of a key, if any.
    pub fn expires_at(&self, key: &[u8]) -> Option<Instant> {
        self.lock().get(key).and_then(|entry| entry.expires_at)
    }

    /// Clears all data from the store.
    pub fn flush(&self) {
        self.lock().clear();
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> u64 {
        self.lock().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns operation statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Removes every entry whose expiry time is at or before `now`.
    ///
    /// Only the opt-in expiry sweeper calls this.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were removed.
    pub fn cleanup_expired(&self, now: Instant) -> u64 {
        let mut data = self.lock();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired_at(now));
        let removed = (before - data.len()) as u64;
        drop(data);

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));
        assert!(engine.exists(b"key"));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent"), None);
        assert!(!engine.exists(b"nonexistent"));
    }

    #[test]
    fn test_binary_values_round_trip() {
        let engine = StorageEngine::new();
        let value = Bytes::from_static(&[0u8, 255, 13, 10, 7]);
        engine.set(Bytes::from_static(b"\x00bin"), value.clone());
        assert_eq!(engine.get(b"\x00bin"), Some(value));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let engine = StorageEngine::new();
        assert!(!engine.delete(b"key"));

        engine.set(Bytes::from("key"), Bytes::from("value"));
        assert!(engine.delete(b"key"));
        assert!(!engine.delete(b"key"));
        assert_eq!(engine.get(b"key"), None);
    }

    #[test]
    fn test_delete_many() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("a"), Bytes::from("1"));
        engine.set(Bytes::from("c"), Bytes::from("3"));

        let keys = vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")];
        assert_eq!(engine.delete_many(&keys), 2);
        assert_eq!(engine.delete_many(&keys), 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_exists_many() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("a"), Bytes::from("1"));

        let keys = vec![Bytes::from("a"), Bytes::from("a"), Bytes::from("b")];
        assert_eq!(engine.exists_many(&keys), 2);
    }

    #[test]
    fn test_set_overwrites_and_clears_expiry() {
        let engine = StorageEngine::new();
        let key = Bytes::from("key");

        engine.set(key.clone(), Bytes::from("v1"));
        assert!(engine.set_expiry(&key, Instant::now() + Duration::from_secs(60)));
        assert!(engine.expires_at(&key).is_some());

        engine.set(key.clone(), Bytes::from("v2"));
        assert_eq!(engine.get(&key), Some(Bytes::from("v2")));
        assert_eq!(engine.expires_at(&key), None);
    }

    #[test]
    fn test_set_expiry_on_missing_key() {
        let engine = StorageEngine::new();
        assert!(!engine.set_expiry(b"missing", Instant::now()));
        assert!(!engine.exists(b"missing"));
    }

    #[test]
    fn test_expired_keys_stay_readable() {
        let engine = StorageEngine::new();
        let key = Bytes::from("session");

        engine.set(key.clone(), Bytes::from("token"));
        engine.set_expiry(&key, Instant::now() - Duration::from_secs(1));

        // Expiry is recorded, not enforced on reads
        assert_eq!(engine.get(&key), Some(Bytes::from("token")));
        assert!(engine.exists(&key));
    }

    #[test]
    fn test_set_with_conditions() {
        let engine = StorageEngine::new();
        let key = Bytes::from("key");

        let outcome = engine.set_with(key.clone(), Bytes::from("v1"), SetCondition::IfPresent, None);
        assert_eq!(outcome, SetOutcome::Skipped);
        assert!(!engine.exists(&key));

        let outcome = engine.set_with(key.clone(), Bytes::from("v1"), SetCondition::IfAbsent, None);
        assert_eq!(outcome, SetOutcome::Written { previous: None });

        let outcome = engine.set_with(key.clone(), Bytes::from("v2"), SetCondition::IfAbsent, None);
        assert_eq!(outcome, SetOutcome::Skipped);
        assert_eq!(engine.get(&key), Some(Bytes::from("v1")));

        let outcome = engine.set_with(key.clone(), Bytes::from("v2"), SetCondition::IfPresent, None);
        assert_eq!(
            outcome,
            SetOutcome::Written {
                previous: Some(Bytes::from("v1"))
            }
        );
        assert_eq!(engine.get(&key), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_set_with_expiry() {
        let engine = StorageEngine::new();
        let at = Instant::now() + Duration::from_secs(10);

        engine.set_with(Bytes::from("key"), Bytes::from("v"), SetCondition::Always, Some(at));
        assert_eq!(engine.expires_at(b"key"), Some(at));
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();
        let now = Instant::now();

        for i in 0..10 {
            let key = Bytes::from(format!("key{}", i));
            engine.set(key.clone(), Bytes::from("value"));
            engine.set_expiry(&key, now);
        }
        engine.set(Bytes::from("persistent"), Bytes::from("value"));
        engine.set(Bytes::from("later"), Bytes::from("value"));
        engine.set_expiry(b"later", now + Duration::from_secs(60));

        assert_eq!(engine.cleanup_expired(now), 10);
        assert_eq!(engine.len(), 2);
        assert!(engine.exists(b"persistent"));
        assert!(engine.exists(b"later"));
        assert_eq!(engine.stats().expired, 10);
    }

    #[test]
    fn test_flush() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("a"), Bytes::from("1"));
        engine.set(Bytes::from("b"), Bytes::from("2"));

        engine.flush();
        assert!(engine.is_empty());
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();
        engine.set(Bytes::from("a"), Bytes::from("1"));
        engine.get(b"a");
        engine.get(b"b");
        engine.delete(b"a");

        let stats = engine.stats();
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.set_ops, 1);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.del_ops, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = Bytes::from(format!("key_{}_{}", i, j));
                    let value = Bytes::from(format!("value_{}_{}", i, j));
                    engine.set(key.clone(), value.clone());
                    assert_eq!(engine.get(&key), Some(value));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_concurrent_writes_to_same_key() {
        let engine = Arc::new(StorageEngine::new());
        let a = Bytes::from("a".repeat(1024));
        let b = Bytes::from("b".repeat(1024));

        let handles: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|value| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..500 {
                        engine.set(Bytes::from("shared"), value.clone());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let value = engine.get(b"shared").unwrap();
        assert!(value == a || value == b);
    }
}
