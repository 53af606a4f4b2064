//! Live views over the forecast store.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;

use weathernews_store::Store;

use crate::error::Result;
use crate::executor::StorageContext;

type StoreQuery<T> = Arc<dyn Fn(&Store) -> weathernews_store::Result<T> + Send + Sync>;

/// A store query that re-runs whenever the cache is replaced.
///
/// The store generation increases with every successful replace. A
/// `LiveQuery` remembers the last generation it observed and
/// [`changed`](Self::changed) waits for a newer one.
pub struct LiveQuery<T> {
    storage: StorageContext,
    generation: watch::Receiver<u64>,
    query: StoreQuery<T>,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            generation: self.generation.clone(),
            query: Arc::clone(&self.query),
        }
    }
}

impl<T> std::fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("generation", &*self.generation.borrow())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> LiveQuery<T> {
    pub(crate) fn new<F>(storage: StorageContext, generation: watch::Receiver<u64>, query: F) -> Self
    where
        F: Fn(&Store) -> weathernews_store::Result<T> + Send + Sync + 'static,
    {
        Self {
            storage,
            generation,
            query: Arc::new(query),
        }
    }

    /// Run the query against the store now.
    pub async fn current(&self) -> Result<T> {
        let query = Arc::clone(&self.query);
        self.storage.run(move |store| Ok(query(store)?)).await
    }

    /// Wait for the next cache replace, then run the query.
    ///
    /// Returns `None` when the repository has been dropped.
    pub async fn changed(&mut self) -> Option<Result<T>> {
        self.generation.changed().await.ok()?;
        Some(self.current().await)
    }

    /// Store generation last observed by this query.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Stream the current result, then one result per cache replace.
    ///
    /// Replaces that happen while the consumer is busy are coalesced.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        futures::stream::unfold((self, true), |(mut live, first)| async move {
            let item = if first {
                live.current().await
            } else {
                live.changed().await?
            };
            Some((item, (live, false)))
        })
    }
}
