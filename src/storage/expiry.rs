//! Background Expiry Sweeper
//!
//! By default BlitzDB only *records* expiry times: `SET key value EX 10`
//! stores the deadline, but the key stays readable forever. That is the
//! store's reference behavior.
//!
//! The sweeper is an opt-in extension (`--active-expiry`). When running, it
//! wakes up every `interval` and removes every entry whose deadline has
//! passed. Reads still never check the deadline, so an expired key remains
//! visible until the next sweep.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for the configured interval
//! 2. Removes all expired entries under one lock acquisition
//! 3. Logs how many keys were removed
//!
//! It stops when its handle is dropped or [`ExpirySweeper::stop`] is called.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps (default: 100ms)
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let expired = engine.cleanup_expired(Instant::now());
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());
        let deadline = Instant::now() + Duration::from_millis(50);

        for i in 0..10 {
            let key = Bytes::from(format!("key{}", i));
            engine.set(key.clone(), Bytes::from("value"));
            engine.set_expiry(&key, deadline);
        }
        engine.set(Bytes::from("persistent"), Bytes::from("value"));

        assert_eq!(engine.len(), 11);

        let config = ExpiryConfig {
            interval: Duration::from_millis(10),
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Only the persistent key should remain
        assert_eq!(engine.len(), 1);
        assert!(engine.exists(b"persistent"));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let engine = Arc::new(StorageEngine::new());

        let config = ExpiryConfig {
            interval: Duration::from_millis(10),
        };

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        engine.set(Bytes::from("key"), Bytes::from("value"));
        engine.set_expiry(b"key", Instant::now());

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nobody sweeps any more, and reads do not enforce expiry
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));
    }
}
