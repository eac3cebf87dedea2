//! Per-key serialization of upstream fetches within one process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct InFlightFetches {
    keys: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InFlightFetches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder owns `key`, then claims it.
    pub async fn acquire(&self, key: &str) -> FetchPermit {
        let lock = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        FetchPermit {
            key: key.to_string(),
            keys: Arc::clone(&self.keys),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct FetchPermit {
    key: String,
    keys: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        // Release before the count check so only the map's own reference remains.
        drop(self.guard.take());
        self.keys
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
