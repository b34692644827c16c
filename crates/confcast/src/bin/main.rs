use clap::Parser;
use confcast::config::Settings;
use confcast::fetch::HttpFetcher;
use confcast::{CacheServer, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replica cache server for configuration variables", long_about = None)]
struct Args {
    /// Host address to listen on, empty for all interfaces
    #[arg(long)]
    host: Option<String>,

    /// Service port
    #[arg(long)]
    port: Option<u16>,

    /// URL of a JSON object used as initial cache content
    #[arg(long)]
    from: Option<String>,

    /// Optional settings file, flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(&path.to_string_lossy())?,
        None => Settings::default(),
    };
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(from) = args.from {
        settings.bootstrap_url = Some(from);
    }

    let store = match &settings.bootstrap_url {
        Some(url) => {
            info!("bootstrapping store from {}", url);
            Store::from_url(url, &HttpFetcher::default()).await?
        }
        None => Store::new(),
    };

    let server = CacheServer::bind(Arc::new(store), &settings.addr()).await?;
    server.run().await?;
    Ok(())
}
