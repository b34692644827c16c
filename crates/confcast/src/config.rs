use serde::{Deserialize, Serialize};

/// Settings of one replica server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Host to listen on; empty means all interfaces.
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL of a JSON object loaded as initial cache content.
    #[serde(default)]
    pub bootstrap_url: Option<String>,
}

fn default_port() -> u16 {
    crate::rpc::DEFAULT_PORT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            bootstrap_url: None,
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        settings.try_deserialize()
    }

    /// The bind address, all interfaces when the host is empty.
    pub fn addr(&self) -> String {
        if self.host.is_empty() {
            format!("0.0.0.0:{}", self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
