use tokio::net::TcpListener;

use hs_sdk::HashStreamNode;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Hash stream HTTP server.
pub struct HashStreamServer {
    config: ServerConfig,
}

impl HashStreamServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the node and start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let node = HashStreamNode::open(self.config.node).await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            store = %node.config().store_path.display(),
            raw = %node.config().raw_content_path.display(),
            "hash stream server listening"
        );
        axum::serve(listener, build_router(node))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
