use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hs_sdk::HashStreamConfig;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Server configuration: where to listen, plus the node it serves.
///
/// ```toml
/// bind_addr = "127.0.0.1:8080"
///
/// [node]
/// raw_content_path = "/srv/files"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    pub node: HashStreamConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl ServerConfig {
    pub fn new(node: HashStreamConfig) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            node,
        }
    }

    pub fn from_toml_str(content: &str) -> ServerResult<Self> {
        toml::from_str(content).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded server configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}
