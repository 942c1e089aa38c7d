//! Per-store-file mutual exclusion.
//!
//! Every mutation of a store file runs while holding that file's permit.
//! Callers on the same path queue up in FIFO order; different paths never
//! contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use tk_domain::error::{Error, Result};

/// Manages one `Semaphore(1)` per store path.
pub struct StoreLockMap {
    locks: Mutex<HashMap<PathBuf, Arc<Semaphore>>>,
}

impl Default for StoreLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive section for a store path.
    ///
    /// The permit auto-releases on drop.  Relative and absolute spellings
    /// of the same path share one lock.
    pub async fn acquire(&self, path: &Path) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(lock_key(path))
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("store lock closed: {}", path.display())))
    }

    /// Number of tracked store paths (for monitoring).
    pub fn path_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody holds or waits on.
    ///
    /// A semaphore referenced only by the map has no holder and no waiter,
    /// so removing it cannot split callers across two semaphores.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}

fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
