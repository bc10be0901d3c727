use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Run-scoped memo of upstream responses, shared by clones.
///
/// Entries never expire; the cache lives as long as the provider owning it.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    entries: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let value = self.entries.lock().await.get(key).cloned();
        debug!(?key, hit = value.is_some(), "Response cache lookup");
        value
    }

    pub async fn put(&self, key: K, value: V) {
        debug!(?key, "Response cache store");
        self.entries.lock().await.insert(key, value);
    }

    /// Cached value for `key`, or the output of `fetch` stored under it.
    ///
    /// Whatever `fetch` yields is kept, so a cached `Result` remembers
    /// failures as well and the key is fetched at most once.
    pub async fn get_or_insert_with<F, Fut>(&self, key: K, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            return value;
        }
        let value = fetch().await;
        self.put(key, value.clone()).await;
        value
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A byte-oriented collection whose entries may expire.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);
    async fn remove(&self, key: &[u8]);
}

/// Hands out named collections, persistent or in-memory.
pub trait Store {
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection>;
}
