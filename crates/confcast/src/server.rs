use crate::store::{Store, StoreError};
use crate::wire::{self, Request, Response, WireError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// TCP server exposing one [`Store`] over the cache RPC surface.
///
/// Each accepted connection is served on its own task; requests on a
/// connection are processed sequentially. Connection tasks belong to the
/// `run` future, so dropping it tears the whole replica down.
pub struct CacheServer {
    store: Arc<Store>,
    listener: TcpListener,
}

impl CacheServer {
    /// Bind the listening socket. An empty host listens on all interfaces.
    pub async fn bind(store: Arc<Store>, addr: &str) -> Result<Self, std::io::Error> {
        let addr = if let Some(port) = addr.strip_prefix(':') {
            format!("0.0.0.0:{}", port)
        } else {
            addr.to_string()
        };
        // A numeric address gets a reuseaddr socket so a replica can rebind
        // its port right after a restart; hostnames go through resolution.
        let listener = match addr.parse::<SocketAddr>() {
            Ok(sockaddr) => {
                let socket = match sockaddr {
                    SocketAddr::V4(_) => TcpSocket::new_v4()?,
                    SocketAddr::V6(_) => TcpSocket::new_v6()?,
                };
                socket.set_reuseaddr(true)?;
                socket.bind(sockaddr)?;
                socket.listen(1024)?
            }
            Err(_) => TcpListener::bind(&addr).await?,
        };
        Ok(Self { store, listener })
    }

    /// The bound address, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        info!("cache server listening on {}", self.listener.local_addr()?);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted?;
                    debug!("new connection from {}", peer);

                    let store = Arc::clone(&self.store);
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(socket, store).await {
                            error!("connection error from {}: {}", peer, e);
                        }
                    });
                }
                // Reap finished connection tasks so the set stays bounded.
                _ = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream, store: Arc<Store>) -> Result<(), WireError> {
    loop {
        let request = match wire::read_frame::<Request, _>(&mut socket).await? {
            Some(request) => request,
            None => {
                debug!("connection closed");
                return Ok(());
            }
        };
        let response = dispatch(&store, request).await;
        wire::write_frame(&mut socket, &response).await?;
    }
}

async fn dispatch(store: &Store, request: Request) -> Response {
    match request {
        Request::Get { key } => match store.get(&key).await {
            Ok(item) => Response::Item(item),
            Err(StoreError::NotFound) => Response::NotFound,
        },
        Request::Put { item } => {
            store.put(item).await;
            Response::Ack(true)
        }
        Request::Bulk { items } => {
            store.bulk(items).await;
            Response::Ack(true)
        }
        Request::Delete { key } => match store.delete(&key).await {
            Ok(()) => Response::Ack(true),
            Err(StoreError::NotFound) => Response::NotFound,
        },
        Request::Clear => {
            store.clear().await;
            Response::Ack(true)
        }
        Request::Stats => Response::Metrics(store.stats().await),
    }
}
