use clap::Parser;
use confcast::{CacheServer, Store};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run multiple replicas locally for development", long_about = None)]
struct Args {
    /// Number of replicas to start
    #[arg(short, long, default_value = "3")]
    replicas: u16,

    /// First port; each replica takes the next one
    #[arg(long, default_value_t = confcast::rpc::DEFAULT_PORT)]
    base_port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut replicas = Vec::new();
    for i in 0..args.replicas {
        let addr = format!("127.0.0.1:{}", args.base_port + i);
        let server = CacheServer::bind(Arc::new(Store::new()), &addr).await?;
        info!("replica {} serving on {}", i + 1, addr);
        replicas.push(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("replica error: {}", e);
            }
        }));
    }

    for replica in replicas {
        replica.await?;
    }
    Ok(())
}
