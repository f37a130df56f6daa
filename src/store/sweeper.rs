//! Background Purge Sweeper
//!
//! A single long-lived task that sleeps for the configured purge interval
//! and then asks the store to run a full expiry scan, for the life of the
//! process (or until the handle is dropped).
//!
//! A failed sweep is not fatal: it is logged and the loop continues to the
//! next tick. No state survives a failed attempt; every cycle is a full,
//! independent rescan.

use crate::store::coordinator::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// A handle to the running purge sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct PurgeSweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl PurgeSweeper {
    /// Starts the purge sweeper as a background task.
    ///
    /// Each tick runs [`SessionStore::purge_expired`] on the blocking
    /// thread pool, since the scan is ordinary disk I/O and may hold shard
    /// locks for a while.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sessionfs::{PurgeSweeper, SessionStore, StoreConfig};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let store = Arc::new(SessionStore::new(StoreConfig::default())?);
    /// let sweeper = PurgeSweeper::start(Arc::clone(&store), Duration::from_secs(60));
    ///
    /// // Sweeper runs in the background...
    ///
    /// // Dropping the handle stops it
    /// drop(sweeper);
    /// ```
    pub fn start(store: Arc<SessionStore>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, interval, shutdown_rx));

        info!(interval_secs = interval.as_secs(), "background purge sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the purge sweeper.
    ///
    /// This is called automatically when the handle is dropped. Stopping
    /// an already-stopped sweeper is a no-op.
    pub fn stop(&self) {
        let was_stopped = self.shutdown_tx.send_replace(true);
        if !was_stopped {
            info!("background purge sweeper stopped");
        }
    }
}

impl Drop for PurgeSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    store: Arc<SessionStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("purge sweeper received shutdown signal");
                    return;
                }
            }
        }

        let scan = {
            let store = Arc::clone(&store);
            tokio::task::spawn_blocking(move || store.purge_expired()).await
        };

        match scan {
            Ok(Ok(removed)) if removed > 0 => {
                debug!(removed, "expired sessions purged");
            }
            Ok(Ok(_)) => {
                trace!("purge sweep found nothing to remove");
            }
            Ok(Err(e)) => {
                warn!(error = %e, "purge sweep failed, retrying next cycle");
            }
            Err(e) => {
                warn!(error = %e, "purge sweep task failed to run");
            }
        }
    }
}

/// Starts the purge sweeper using the store's configured purge interval.
///
/// This is a convenience function for simple use cases.
pub fn start_purge_sweeper(store: Arc<SessionStore>) -> PurgeSweeper {
    let interval = store.purge_interval();
    PurgeSweeper::start(store, interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::coordinator::StoreConfig;
    use tempfile::TempDir;

    fn zero_expiry_store(dir: &TempDir) -> Arc<SessionStore> {
        Arc::new(
            SessionStore::new(StoreConfig {
                save_path: dir.path().to_path_buf(),
                expire_interval: Duration::ZERO,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_sessions() {
        let dir = TempDir::new().unwrap();
        let store = zero_expiry_store(&dir);

        let id = store.create(b"stale").unwrap();

        let _sweeper = PurgeSweeper::start(Arc::clone(&store), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.read(&id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let dir = TempDir::new().unwrap();
        let store = zero_expiry_store(&dir);

        {
            let _sweeper = PurgeSweeper::start(Arc::clone(&store), Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Sweeper is dropped here
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Sessions created after the drop are never swept, even though the
        // expire interval is zero.
        let id = store.create(b"survivor").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.read(&id).unwrap().as_ref(), b"survivor");
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = zero_expiry_store(&dir);

        let sweeper = PurgeSweeper::start(Arc::clone(&store), Duration::from_millis(10));
        sweeper.stop();
        sweeper.stop();
        drop(sweeper); // stops once more via Drop
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The task is gone: new sessions are never swept despite the zero
        // expire interval.
        let id = store.create(b"survivor").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.read(&id).unwrap().as_ref(), b"survivor");
    }

    #[tokio::test]
    async fn test_convenience_starter_uses_configured_interval() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            SessionStore::new(StoreConfig {
                save_path: dir.path().to_path_buf(),
                expire_interval: Duration::ZERO,
                purge_interval: Duration::from_millis(10),
                ..Default::default()
            })
            .unwrap(),
        );

        let id = store.create(b"stale").unwrap();

        let _sweeper = start_purge_sweeper(Arc::clone(&store));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.read(&id).unwrap_err().is_not_found());
    }
}
