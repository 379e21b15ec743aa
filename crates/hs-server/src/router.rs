use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use hs_sdk::HashStreamNode;

use crate::handler::{self, AppState};

/// Build the axum router with all endpoints.
pub fn build_router(node: HashStreamNode) -> Router {
    Router::new()
        .route("/ipfs/:cid", get(handler::ipfs_handler))
        .route("/sync", get(handler::sync_handler))
        .route("/health", get(handler::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { node })
}
