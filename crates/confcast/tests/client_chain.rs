use confcast::handler::Handler;
use confcast::rpc::RpcClient;
use confcast::{CacheServer, Client, ClientError, LocalCache, Store, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

async fn spawn_replica() -> (SocketAddr, JoinHandle<()>, Arc<Store>) {
    let store = Arc::new(Store::new());
    let server = CacheServer::bind(Arc::clone(&store), "127.0.0.1:0")
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, handle, store)
}

#[tokio::test]
async fn test_typed_reads_through_replica() {
    let (addr, server, _store) = spawn_replica().await;
    let replica = Arc::new(
        RpcClient::connect(&addr.to_string(), CONNECT_TIMEOUT)
            .await
            .unwrap(),
    );
    replica.set("TEST_QA_NUM", Value::Int(42)).await.unwrap();
    replica
        .set("TEST_QA_GREETING", Value::Text("bonjour".to_string()))
        .await
        .unwrap();

    let mut client = Client::new("test", vec![Arc::clone(&replica) as Arc<dyn Handler>]);
    client.envs(&["qa"]).unwrap();

    assert_eq!(client.get_int("num").await.unwrap(), 42);
    assert_eq!(client.get_string("greeting").await.unwrap(), "bonjour");
    assert_eq!(client.get_int("absent").await, Err(ClientError::NotFound));

    client.close().await;
    replica.close().await;
    server.abort();
}

#[tokio::test]
async fn test_replica_hit_warms_local_cache() {
    let (addr, server, _store) = spawn_replica().await;
    let replica = Arc::new(
        RpcClient::connect(&addr.to_string(), CONNECT_TIMEOUT)
            .await
            .unwrap(),
    );
    replica.set("TEST_NUM", Value::Int(42)).await.unwrap();

    let cache = LocalCache::new(Duration::from_secs(60));
    let client = Client::new("test", vec![]);
    client
        .use_handler(vec![
            Arc::clone(&cache) as Arc<dyn Handler>,
            Arc::clone(&replica) as Arc<dyn Handler>,
        ])
        .await;

    assert_eq!(client.get_int("num").await.unwrap(), 42);
    assert_eq!(cache.get("TEST_NUM"), Some(Value::Int(42)));

    // The replica goes away; the warmed entry keeps answering.
    server.abort();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(client.get_int("num").await.unwrap(), 42);

    client.close().await;
    replica.close().await;
}

#[tokio::test]
async fn test_watchdog_preserves_values_while_replicas_are_down() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (addr, server, _store) = spawn_replica().await;
    let replica = Arc::new(
        RpcClient::open(&addr.to_string(), CONNECT_TIMEOUT)
            .await
            .unwrap(),
    );
    replica.set("TEST_NUM", Value::Int(42)).await.unwrap();

    let cache = LocalCache::new(Duration::from_millis(200));
    let client = Client::with_tick("test", vec![], Duration::from_millis(50));
    client
        .use_handler(vec![
            Arc::clone(&cache) as Arc<dyn Handler>,
            Arc::clone(&replica) as Arc<dyn Handler>,
        ])
        .await;

    assert_eq!(client.get_int("num").await.unwrap(), 42);

    // Every voting handler goes down; the watchdog suspends expiry before
    // the warmed entry's deadline passes.
    server.abort();
    sleep(Duration::from_millis(400)).await;
    assert!(!cache.with_expiration());
    assert_eq!(client.get_int("num").await.unwrap(), 42);

    client.close().await;
    replica.close().await;
}
