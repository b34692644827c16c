use crate::fetch::{Fetch, FetchError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("fetching {url}: {source}")]
    Fetch { url: String, source: FetchError },
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed bootstrap document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The unit the store keeps and the RPC surface transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub value: Value,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Usage counters of one replica, snapshotted by `Stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub items: u64,
    pub bulk: u64,
    pub clear: u64,
    pub delete: u64,
    pub get: u64,
    pub put: u64,
    #[serde(default)]
    pub uptime: Duration,
}

#[derive(Default, Debug)]
struct Counters {
    items: AtomicU64,
    bulk: AtomicU64,
    clear: AtomicU64,
    delete: AtomicU64,
    get: AtomicU64,
    put: AtomicU64,
}

/// In-memory key/value store behind the replica RPC surface.
///
/// Reads (`get`, `stats`) run under the shared lock; every mutation takes
/// the exclusive lock for its whole duration, so a `bulk` batch is observed
/// either entirely applied or not at all. The `items` counter tracks the map
/// cardinality across every mutation.
#[derive(Debug)]
pub struct Store {
    data: RwLock<HashMap<String, Value>>,
    counters: Counters,
    up: Instant,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            counters: Counters::default(),
            up: Instant::now(),
        }
    }

    /// Build a store from a JSON object fetched over HTTP.
    ///
    /// The body must be a JSON object of key to scalar; every entry is
    /// loaded as a `put`, so `items` and `put` end up at the loaded count.
    /// Any transport error, non-200 status or parse failure fails the
    /// construction. An empty object is legal and yields an empty store.
    pub async fn from_url(url: &str, fetcher: &dyn Fetch) -> Result<Self, BootstrapError> {
        let fetched = fetcher
            .get(url)
            .await
            .map_err(|source| BootstrapError::Fetch {
                url: url.to_string(),
                source,
            })?;
        if fetched.status != 200 {
            return Err(BootstrapError::Status(fetched.status));
        }
        let seed: HashMap<String, Value> = serde_json::from_slice(&fetched.body)?;

        let store = Self::new();
        let count = seed.len();
        for (key, value) in seed {
            store.put(Item { key, value }).await;
        }
        info!(url, count, "store bootstrapped");
        Ok(store)
    }

    /// Value behind the key, or `NotFound`.
    pub async fn get(&self, key: &str) -> Result<Item, StoreError> {
        let data = self.data.read().await;
        let value = data.get(key).ok_or(StoreError::NotFound)?.clone();
        self.counters.get.fetch_add(1, Ordering::Relaxed);
        Ok(Item {
            key: key.to_string(),
            value,
        })
    }

    /// Unconditional insert-or-overwrite.
    pub async fn put(&self, item: Item) {
        let mut data = self.data.write().await;
        if data.insert(item.key, item.value).is_none() {
            self.counters.items.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.put.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove the key. An absent key is an error, not a silent success.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        if data.remove(key).is_none() {
            return Err(StoreError::NotFound);
        }
        self.counters.items.fetch_sub(1, Ordering::Relaxed);
        self.counters.delete.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Empty the map.
    pub async fn clear(&self) {
        let mut data = self.data.write().await;
        data.clear();
        self.counters.items.store(0, Ordering::Relaxed);
        self.counters.clear.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a whole batch under a single exclusive acquisition.
    ///
    /// A `Null` value deletes the key if present, anything else upserts.
    /// Outside observers see either the pre-batch or the post-batch state.
    /// `bulk` is counted once regardless of the batch size.
    pub async fn bulk(&self, batch: Vec<Item>) {
        let mut data = self.data.write().await;
        for item in batch {
            if item.value.is_null() {
                if data.remove(&item.key).is_some() {
                    self.counters.items.fetch_sub(1, Ordering::Relaxed);
                }
            } else if data.insert(item.key, item.value).is_none() {
                self.counters.items.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.counters.bulk.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters. Does not mutate them.
    pub async fn stats(&self) -> Metrics {
        let _data = self.data.read().await;
        Metrics {
            items: self.counters.items.load(Ordering::Relaxed),
            bulk: self.counters.bulk.load(Ordering::Relaxed),
            clear: self.counters.clear.load(Ordering::Relaxed),
            delete: self.counters.delete.load(Ordering::Relaxed),
            get: self.counters.get.load(Ordering::Relaxed),
            put: self.counters.put.load(Ordering::Relaxed),
            uptime: self.up.elapsed(),
        }
    }
}
