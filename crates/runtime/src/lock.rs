//! Per-origin turn serialisation.
//!
//! One turn runs per channel at a time. A second message from the same
//! channel waits until the first turn, busy-indicator stop included, has
//! finished. Different channels run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each origin maps to a `Semaphore(1)`.
#[derive(Default)]
pub struct OriginLocks {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl OriginLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `origin`. The permit releases on drop.
    pub async fn acquire(&self, origin: &str) -> Result<OwnedSemaphorePermit, OriginClosed> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(origin.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await.map_err(|_| OriginClosed)
    }

    /// `true` while a turn holds `origin`.
    pub fn is_busy(&self, origin: &str) -> bool {
        self.locks
            .lock()
            .get(origin)
            .is_some_and(|sem| sem.available_permits() == 0)
    }

    pub fn origin_count(&self) -> usize {
        self.locks.lock().len()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("turn lock closed")]
pub struct OriginClosed;
