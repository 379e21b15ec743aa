//! High-level SDK for Hash Stream.
//!
//! [`HashStreamNode`] is the entry point for applications embedding a node:
//! it opens the filesystem stores named by a [`HashStreamConfig`] and exposes
//! retrieval ([`HashStreamNode::get`]) and ingestion
//! ([`HashStreamNode::sync_all`]) over them.

pub mod config;
pub mod error;
pub mod node;

pub use config::{expand_home, HashStreamConfig, SchedulerKind, DEFAULT_STORE_PATH};
pub use error::{SdkError, SdkResult};
pub use node::HashStreamNode;

// Re-export key types
pub use hs_format::Format;
pub use hs_index::IndexScheme;
pub use hs_pipeline::{IndexedFile, PackingMode, SyncFailure, SyncReport};
pub use hs_streamer::{BlockStream, Representation, Retrieval, StreamError};
pub use hs_types::{Block, ContentId};
