use crate::handler::Handler;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Default duration to keep data in the local cache.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(15 * 60);

struct Entry {
    value: Value,
    expires: Instant,
}

impl Entry {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires
    }
}

/// In-process cache in front of the remote sources.
///
/// Every insertion carries the same TTL, measured from the insertion.
/// A sweeper ticking at the TTL period removes expired entries; a read on
/// an expired entry deletes it on the spot, which is why reads take the
/// exclusive lock. While expiration is disabled the bookkeeping stays in
/// place but neither the sweeper nor reads consider entries expired.
///
/// `close` must be called to stop the sweeper, otherwise its task leaks.
pub struct LocalCache {
    data: Mutex<HashMap<String, Entry>>,
    duration: Duration,
    expire: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LocalCache {
    /// Create the cache and start its sweeper.
    pub fn new(duration: Duration) -> Arc<Self> {
        let cache = Arc::new(Self {
            data: Mutex::new(HashMap::new()),
            duration,
            expire: AtomicBool::new(true),
            sweeper: Mutex::new(None),
        });
        let sweeping = Arc::clone(&cache);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(duration).await;
                sweeping.sweep();
            }
        });
        if let Ok(mut sweeper) = cache.sweeper.lock() {
            *sweeper = Some(task);
        }
        cache
    }

    /// Value behind the key, deleting it first when it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut data = self.data.lock().ok()?;
        let entry = data.get(key)?;
        if self.with_expiration() && entry.expired() {
            data.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store the value with the configured TTL from now.
    pub fn set(&self, key: &str, value: Value) {
        if let Ok(mut data) = self.data.lock() {
            data.insert(
                key.to_string(),
                Entry {
                    value,
                    expires: Instant::now() + self.duration,
                },
            );
        }
    }

    pub fn delete(&self, key: &str) {
        if let Ok(mut data) = self.data.lock() {
            data.remove(key);
        }
    }

    /// Re-enable TTL enforcement.
    pub fn use_expiration(&self) {
        self.expire.store(true, Ordering::Relaxed);
    }

    /// Suspend TTL enforcement, preserving stored entries as they are.
    pub fn no_expiration(&self) {
        self.expire.store(false, Ordering::Relaxed);
    }

    pub fn with_expiration(&self) -> bool {
        self.expire.load(Ordering::Relaxed)
    }

    /// Stop the sweeper.
    pub fn close(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
            }
        }
    }

    fn sweep(&self) {
        if !self.with_expiration() {
            return;
        }
        if let Ok(mut data) = self.data.lock() {
            data.retain(|_, entry| !entry.expired());
        }
    }
}

#[async_trait]
impl Handler for LocalCache {
    async fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key)
    }

    fn as_local(&self) -> Option<&LocalCache> {
        Some(self)
    }
}
