//! Index layer for Hash Stream.
//!
//! Maps a multihash to the locations of the blocks needed to rebuild it.
//!
//! # Architecture
//!
//! - **IndexRecord**: `Blob` (one block), `Flat` (single-level), `Node` (multiple-level)
//! - **IndexStore**: several deduplicated records per key (memory and filesystem)
//! - **IndexWriter**: [`SingleLevelIndexWriter`] flattens a DAG into one record;
//!   [`MultipleLevelIndexWriter`] keeps its tree shape so subtrees resolve on demand
//! - **IndexReader**: lazy depth-first resolution over either scheme

pub mod error;
pub mod reader;
pub mod record;
pub mod store;
pub mod writer;

pub use error::{IndexError, IndexResult};
pub use reader::{BlockRefStream, IndexReader};
pub use record::{IndexRecord, Link};
pub use store::{FsIndexStore, IndexStore, MemoryIndexStore};
pub use writer::{
    writer_for, IndexScheme, IndexWriter, MultipleLevelIndexWriter, SingleLevelIndexWriter,
};
