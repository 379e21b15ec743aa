//! Retrieval engine for Hash Stream.
//!
//! [`HashStreamer`] answers "stream me the blocks for identifier X". It
//! resolves the identifier through the index, fetches each block through the
//! pack reader, and yields blocks in resolved order.
//!
//! Identity identifiers carry their own payload and never touch a store. An
//! identifier that was never indexed is reported as not found, distinct from
//! an indexed one whose blocks turn out to be missing or corrupt.

pub mod error;
pub mod streamer;

pub use error::{StreamError, StreamResult};
pub use streamer::{
    collect_content, BlockStream, HashStreamer, Representation, Retrieval, StreamOptions,
};
