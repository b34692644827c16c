pub mod binder;
pub mod client;
pub mod config;
pub mod deploy;
pub mod env;
pub mod fetch;
pub mod handler;
pub mod local;
pub mod rpc;
pub mod server;
pub mod store;
pub mod value;
pub mod wire;

pub use binder::{Bindings, Target};
pub use client::{Client, ClientError};
pub use deploy::{Release, Serverless, Source, Task};
pub use env::OsEnv;
pub use handler::Handler;
pub use local::LocalCache;
pub use rpc::RpcClient;
pub use server::CacheServer;
pub use store::{Item, Metrics, Store};
pub use value::{Kind, Value};
