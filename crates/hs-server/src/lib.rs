//! HTTP server for Hash Stream.
//!
//! A thin boundary over [`hs_sdk::HashStreamNode`]:
//!
//! - `GET /ipfs/:cid` answers with a single raw block
//!   (`application/vnd.ipld.raw`) or the CARv1 of the block tree
//!   (`application/vnd.ipld.car`, the default). Unknown identifiers are 404.
//! - `GET /sync` indexes new files and returns `[{ file, cid }]`.
//! - `GET /health` reports liveness.

pub mod car;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use car::{read_car, write_car, Car, CAR_CONTENT_TYPE};
pub use config::{ServerConfig, DEFAULT_BIND_ADDR};
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::{AppState, SyncEntry, RAW_CONTENT_TYPE};
pub use router::build_router;
pub use server::HashStreamServer;
