use crate::deploy;
use crate::env::OsEnv;
use crate::handler::Handler;
use crate::local::{LocalCache, DEFAULT_CACHE_DURATION};
use crate::value::{Kind, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Period of the liveness watchdog by default.
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found")]
    NotFound,
    #[error("invalid data")]
    Invalid,
}

type Chain = Vec<Arc<dyn Handler>>;

/// Reader over an ordered chain of variable sources.
///
/// Lookups walk the chain in order: the local cache first, then the OS
/// environment, then any remote sources given at construction. Hits from a
/// non-cache handler warm the local cache under the same deploy key. A
/// watchdog disables local-cache expiry while every voting source is down,
/// preserving last-known-good values.
pub struct Client {
    project: String,
    env1: String,
    env2: String,
    chain: Arc<RwLock<Chain>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Client for the project, with the default cache TTL and watchdog tick.
    pub fn new(project: impl Into<String>, servers: Vec<Arc<dyn Handler>>) -> Self {
        Self::with_tick(project, servers, DEFAULT_TICK)
    }

    /// Like [`Client::new`] with a custom watchdog period.
    pub fn with_tick(
        project: impl Into<String>,
        servers: Vec<Arc<dyn Handler>>,
        tick: Duration,
    ) -> Self {
        let mut handlers: Chain = vec![
            LocalCache::new(DEFAULT_CACHE_DURATION) as Arc<dyn Handler>,
            Arc::new(OsEnv),
        ];
        handlers.extend(servers);

        let chain = Arc::new(RwLock::new(handlers));
        let watched = Arc::clone(&chain);
        let watchdog = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                freshen(&watched).await;
            }
        });
        Self {
            project: project.into(),
            env1: String::new(),
            env2: String::new(),
            chain,
            watchdog: Mutex::new(Some(watchdog)),
        }
    }

    /// Select up to two environment-value labels, in the order the project
    /// declares its environments.
    pub fn envs(&mut self, envs: &[&str]) -> Result<(), ClientError> {
        match envs {
            [first] => {
                self.env1 = first.to_string();
                Ok(())
            }
            [first, second] => {
                self.env1 = first.to_string();
                self.env2 = second.to_string();
                Ok(())
            }
            _ => Err(ClientError::Invalid),
        }
    }

    /// Replace the whole handler chain.
    pub async fn use_handler(&self, chain: Chain) {
        *self.chain.write().await = chain;
    }

    /// The deploy key a variable name resolves to for this client.
    pub fn deploy_key(&self, name: &str) -> String {
        deploy::key(&[&self.project, &self.env1, &self.env2, name])
    }

    /// Value behind the key, or `None` when no handler holds it.
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        self.assert(key, Kind::Text).await
    }

    /// Like [`Client::lookup`], discarding the reason for a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).await
    }

    pub async fn get_bool(&self, key: &str) -> Result<bool, ClientError> {
        match self.assert(key, Kind::Bool).await {
            None => Err(ClientError::NotFound),
            Some(Value::Bool(b)) => Ok(b),
            Some(_) => Err(ClientError::Invalid),
        }
    }

    /// Integer value behind the key. An integral float is accepted: numbers
    /// that crossed a JSON round-trip may surface that way.
    pub async fn get_int(&self, key: &str) -> Result<i64, ClientError> {
        match self.assert(key, Kind::Int).await {
            None => Err(ClientError::NotFound),
            Some(Value::Int(i)) => Ok(i),
            Some(Value::Float(f)) if f.fract() == 0.0 => Ok(f as i64),
            Some(_) => Err(ClientError::Invalid),
        }
    }

    pub async fn get_float(&self, key: &str) -> Result<f64, ClientError> {
        match self.assert(key, Kind::Float).await {
            None => Err(ClientError::NotFound),
            Some(Value::Float(f)) => Ok(f),
            Some(Value::Int(i)) => Ok(i as f64),
            Some(_) => Err(ClientError::Invalid),
        }
    }

    pub async fn get_string(&self, key: &str) -> Result<String, ClientError> {
        match self.assert(key, Kind::Text).await {
            None => Err(ClientError::NotFound),
            Some(Value::Text(s)) => Ok(s),
            Some(_) => Err(ClientError::Invalid),
        }
    }

    /// Like [`Client::get_bool`] but aborts when the variable cannot be
    /// retrieved.
    pub async fn must_bool(&self, key: &str) -> bool {
        match self.get_bool(key).await {
            Ok(v) => v,
            Err(e) => self.fatal("Bool", key, &e),
        }
    }

    pub async fn must_int(&self, key: &str) -> i64 {
        match self.get_int(key).await {
            Ok(v) => v,
            Err(e) => self.fatal("Int", key, &e),
        }
    }

    pub async fn must_float(&self, key: &str) -> f64 {
        match self.get_float(key).await {
            Ok(v) => v,
            Err(e) => self.fatal("Float", key, &e),
        }
    }

    pub async fn must_string(&self, key: &str) -> String {
        match self.get_string(key).await {
            Ok(v) => v,
            Err(e) => self.fatal("String", key, &e),
        }
    }

    /// Stop the watchdog and the sweeper of any local cache in the chain.
    pub async fn close(&self) {
        if let Ok(mut watchdog) = self.watchdog.lock() {
            if let Some(task) = watchdog.take() {
                task.abort();
            }
        }
        for handler in self.chain.read().await.iter() {
            if let Some(cache) = handler.as_local() {
                cache.close();
            }
        }
    }

    /// Walk the chain for the deploy key of `name`, asserting hits to the
    /// requested kind.
    ///
    /// A coercion failure counts as a miss and the walk advances. The final
    /// hit, when it does not come from the local cache, is written through
    /// to the local cache under the same key.
    async fn assert(&self, name: &str, kind: Kind) -> Option<Value> {
        let key = self.deploy_key(name);
        let chain = self.chain.read().await;
        for handler in chain.iter() {
            let Some(raw) = handler.lookup(&key).await else {
                continue;
            };
            let Some(value) = handler.assert(raw, kind) else {
                continue;
            };
            if handler.as_local().is_none() {
                if let Some(cache) = chain.iter().find_map(|h| h.as_local()) {
                    cache.set(&key, value.clone());
                }
            }
            return Some(value);
        }
        None
    }

    fn fatal(&self, method: &str, key: &str, err: &ClientError) -> ! {
        panic!("confcast: {}({:?}): {}", method, self.deploy_key(key), err)
    }
}

/// One watchdog pass: when at least one voting handler is up, the local
/// cache expires normally; when every voting handler is down, expiry is
/// suspended so last-known-good values survive.
async fn freshen(chain: &RwLock<Chain>) {
    let handlers = chain.read().await.clone();
    let mut alive = false;
    for handler in &handlers {
        if handler.available().await == Some(true) {
            alive = true;
            break;
        }
    }
    if let Some(cache) = handlers.iter().find_map(|h| h.as_local()) {
        if alive {
            if !cache.with_expiration() {
                cache.use_expiration();
            }
        } else if cache.with_expiration() {
            cache.no_expiration();
        }
    }
}
