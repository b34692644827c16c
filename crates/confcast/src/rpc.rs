use crate::deploy::Endpoint;
use crate::handler::Handler;
use crate::store::Metrics;
use crate::value::Value;
use crate::wire::{self, Request, Response, WireError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

/// Port a replica listens on by default.
pub const DEFAULT_PORT: u16 = 9090;

/// Default connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Period of the reconnect ticker.
pub const RECONNECT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no live connection")]
    Conn,
    #[error("request has failed")]
    Failure,
    #[error("not found")]
    NotFound,
    #[error("no available rpc service")]
    NoService,
    #[error("connect timeout after {0:?}")]
    Timeout(Duration),
    #[error("unexpected reply")]
    Unexpected,
    #[error(transparent)]
    Wire(#[from] WireError),
}

struct Conn {
    dsn: String,
    timeout: Duration,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
}

impl Conn {
    async fn dial(dsn: &str, timeout: Duration) -> Result<TcpStream, RpcError> {
        let addr = normalize(dsn);
        match tokio::time::timeout(timeout, TcpStream::connect(addr.as_ref())).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(RpcError::Wire(WireError::Io(e))),
            Err(_) => Err(RpcError::Timeout(timeout)),
        }
    }

    /// One request/response round-trip on the live connection.
    ///
    /// A transport failure drops the connection; the reconnect ticker will
    /// dial a fresh one.
    async fn call(&self, request: &Request) -> Result<Response, RpcError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(RpcError::Conn)?;
        match roundtrip(stream, request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                *guard = None;
                Err(e.into())
            }
        }
    }
}

async fn roundtrip(stream: &mut TcpStream, request: &Request) -> Result<Response, WireError> {
    wire::write_frame(stream, request).await?;
    match wire::read_frame::<Response, _>(stream).await? {
        Some(response) => Ok(response),
        None => Err(WireError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed mid-call",
        ))),
    }
}

/// A DSN has the form `host:port`; an empty host means localhost.
fn normalize(dsn: &str) -> std::borrow::Cow<'_, str> {
    if dsn.starts_with(':') {
        std::borrow::Cow::Owned(format!("127.0.0.1{}", dsn))
    } else {
        std::borrow::Cow::Borrowed(dsn)
    }
}

/// Client over one persistent connection to a replica.
///
/// [`RpcClient::open`] runs a reconnect ticker: every second, when a stats
/// round-trip fails, it redials with the original timeout and swaps the
/// connection in. [`RpcClient::connect`] skips the ticker. `close` must be
/// called on an opened client to stop the ticker.
pub struct RpcClient {
    conn: Arc<Conn>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Dial the replica and keep the connection repaired in the background.
    pub async fn open(dsn: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Self::connect(dsn, timeout).await?;
        let conn = Arc::clone(&client.conn);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(RECONNECT_PERIOD).await;
                reconnect_on_fail(&conn).await;
            }
        });
        if let Ok(mut reconnect) = client.reconnect.lock() {
            *reconnect = Some(ticker);
        }
        Ok(client)
    }

    /// Dial the replica once, with no reconnect mechanism.
    pub async fn connect(dsn: &str, timeout: Duration) -> Result<Self, RpcError> {
        let stream = Conn::dial(dsn, timeout).await?;
        Ok(Self {
            conn: Arc::new(Conn {
                dsn: dsn.to_string(),
                timeout,
                stream: tokio::sync::Mutex::new(Some(stream)),
            }),
            reconnect: Mutex::new(None),
        })
    }

    /// Stop the reconnect ticker and drop the connection.
    pub async fn close(&self) {
        if let Ok(mut reconnect) = self.reconnect.lock() {
            if let Some(ticker) = reconnect.take() {
                ticker.abort();
            }
        }
        *self.conn.stream.lock().await = None;
    }

    /// Whether a stats round-trip currently succeeds.
    pub async fn available(&self) -> bool {
        self.stats().await.is_ok()
    }

    /// Value behind the key, or an error when absent or unreachable.
    pub async fn get(&self, key: &str) -> Result<Value, RpcError> {
        let request = Request::Get {
            key: key.to_string(),
        };
        match self.conn.call(&request).await? {
            Response::Item(item) => Ok(item.value),
            Response::NotFound => Err(RpcError::NotFound),
            _ => Err(RpcError::Unexpected),
        }
    }

    /// Value behind the key; any failure is a miss.
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).await.ok()
    }

    /// Store one item.
    pub async fn set(&self, key: &str, value: Value) -> Result<(), RpcError> {
        let request = Request::Put {
            item: crate::store::Item {
                key: key.to_string(),
                value,
            },
        };
        acked(self.conn.call(&request).await?)
    }

    /// Apply the batch in one call; `Null` values delete their key.
    /// An empty batch is a no-op.
    pub async fn bulk(&self, batch: HashMap<String, Value>) -> Result<(), RpcError> {
        if batch.is_empty() {
            return Ok(());
        }
        let items = batch
            .into_iter()
            .map(|(key, value)| crate::store::Item { key, value })
            .collect();
        acked(self.conn.call(&Request::Bulk { items }).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), RpcError> {
        let request = Request::Delete {
            key: key.to_string(),
        };
        acked(self.conn.call(&request).await?)
    }

    pub async fn clear(&self) -> Result<(), RpcError> {
        acked(self.conn.call(&Request::Clear).await?)
    }

    pub async fn stats(&self) -> Result<Metrics, RpcError> {
        match self.conn.call(&Request::Stats).await? {
            Response::Metrics(metrics) => Ok(metrics),
            _ => Err(RpcError::Unexpected),
        }
    }
}

/// Open one client per address, failing fast on the first unreachable one.
pub async fn servers(dsns: &[String], timeout: Duration) -> Result<Vec<Arc<RpcClient>>, RpcError> {
    if dsns.is_empty() {
        return Err(RpcError::NoService);
    }
    let mut clients = Vec::with_capacity(dsns.len());
    for dsn in dsns {
        clients.push(Arc::new(RpcClient::open(dsn, timeout).await?));
    }
    Ok(clients)
}

async fn reconnect_on_fail(conn: &Conn) {
    if conn.call(&Request::Stats).await.is_ok() {
        return;
    }
    match Conn::dial(&conn.dsn, conn.timeout).await {
        Ok(stream) => {
            *conn.stream.lock().await = Some(stream);
            debug!("reconnected to {}", conn.dsn);
        }
        Err(e) => debug!("reconnect to {} failed: {}", conn.dsn, e),
    }
}

/// A success-shaped reply with `ack=false` is a failure of its own kind.
fn acked(response: Response) -> Result<(), RpcError> {
    match response {
        Response::Ack(true) => Ok(()),
        Response::Ack(false) => Err(RpcError::Failure),
        Response::NotFound => Err(RpcError::NotFound),
        _ => Err(RpcError::Unexpected),
    }
}

#[async_trait]
impl Handler for RpcClient {
    async fn lookup(&self, key: &str) -> Option<Value> {
        RpcClient::lookup(self, key).await
    }

    async fn available(&self) -> Option<bool> {
        Some(RpcClient::available(self).await)
    }
}

#[async_trait]
impl Endpoint for RpcClient {
    async fn lookup(&self, key: &str) -> Option<Value> {
        RpcClient::lookup(self, key).await
    }

    async fn bulk(&self, batch: HashMap<String, Value>) -> Result<(), RpcError> {
        RpcClient::bulk(self, batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dsn() {
        assert_eq!(normalize(":9090"), "127.0.0.1:9090");
        assert_eq!(normalize("10.0.0.7:9090"), "10.0.0.7:9090");
    }

    #[test]
    fn test_acked_mapping() {
        assert!(acked(Response::Ack(true)).is_ok());
        assert!(matches!(acked(Response::Ack(false)), Err(RpcError::Failure)));
        assert!(matches!(acked(Response::NotFound), Err(RpcError::NotFound)));
        assert!(matches!(
            acked(Response::Metrics(Metrics::default())),
            Err(RpcError::Unexpected)
        ));
    }
}
