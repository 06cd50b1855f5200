use catalog_types::CatalogError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedResult<T> = Shared<BoxFuture<'static, Result<T, CatalogError>>>;

/// Keyed single-flight. Concurrent callers for the same key share one
/// detached task; the key is released once that task settles.
pub struct Flight<K, T> {
    pending: Mutex<HashMap<K, SharedResult<T>>>,
}

impl<K, T> Default for Flight<K, T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> Flight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the operation in flight for `key` or starts `make()` as a new
    /// one. Dropping the returned future does not cancel the operation.
    pub async fn run<F, Fut>(self: &Arc<Self>, key: K, make: F) -> Result<T, CatalogError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some(shared) => shared.clone(),
                None => {
                    // Registration happens under the lock, so the task cannot
                    // release the key before it is inserted.
                    let release = Release {
                        flight: self.clone(),
                        key: key.clone(),
                    };
                    let fut = make();
                    let handle = tokio::spawn(async move {
                        let _release = release;
                        fut.await
                    });
                    let shared = async move {
                        handle.await.unwrap_or_else(|err| {
                            Err(CatalogError::UpstreamUnavailable(format!(
                                "Fetch task failed: {err}"
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    pending.insert(key, shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, SharedResult<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Release<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    flight: Arc<Flight<K, T>>,
    key: K,
}

impl<K, T> Drop for Release<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.flight.lock().remove(&self.key);
    }
}
