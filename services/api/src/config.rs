//! Server configuration

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load the listener configuration
    ///
    /// # Environment Variables
    /// - `SERVER_HOST`: interface to bind (default: "0.0.0.0")
    /// - `SERVER_PORT`: port to bind (default: 5000)
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .add_source(Environment::with_prefix("SERVER").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
