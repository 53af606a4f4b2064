//! Execution contexts for storage and network work.
//!
//! Storage work is serialized: at most one unit touches the store at a time,
//! and each unit runs on the blocking pool so SQLite never stalls the async
//! workers. Network work runs as ordinary tokio tasks, bounded by a
//! semaphore.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use weathernews_store::Store;

use crate::error::Result;

/// Default number of concurrent network tasks.
pub const DEFAULT_NETWORK_CONCURRENCY: usize = 4;

/// Single-writer context owning the forecast store.
#[derive(Clone)]
pub struct StorageContext {
    store: Arc<Mutex<Store>>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext").finish_non_exhaustive()
    }
}

impl StorageContext {
    /// Take ownership of `store`.
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `work` against the store and wait for its result.
    ///
    /// Units queue on the store lock in arrival order.
    pub async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = Arc::clone(&self.store).lock_owned().await;
        tokio::task::spawn_blocking(move || work(&guard)).await?
    }
}

/// Bounded context for network requests.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    permits: Arc<Semaphore>,
}

impl Default for NetworkContext {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_CONCURRENCY)
    }
}

impl NetworkContext {
    /// Allow at most `concurrency` tasks in flight (minimum one).
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Spawn `task` once a permit is available.
    pub fn spawn<F, T>(&self, task: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        })
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
