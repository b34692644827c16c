use crate::local::LocalCache;
use crate::value::{Kind, Value};
use async_trait::async_trait;

/// One source in the client's ordered lookup chain.
///
/// `lookup` is the only mandatory capability. The default `assert` passes
/// already-typed values through; handlers holding raw text override it to
/// coerce. The default `available` abstains from the liveness vote; only
/// handlers backed by a remote service vote. `as_local` lets the chain spot
/// its local cache without downcasting.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Value behind the deploy key, or a miss.
    async fn lookup(&self, key: &str) -> Option<Value>;

    /// Coerce a raw hit into the requested kind. `None` is a miss.
    fn assert(&self, value: Value, kind: Kind) -> Option<Value> {
        let _ = kind;
        Some(value)
    }

    /// Liveness vote: `None` abstains, `Some(up)` participates.
    async fn available(&self) -> Option<bool> {
        None
    }

    fn as_local(&self) -> Option<&LocalCache> {
        None
    }
}
