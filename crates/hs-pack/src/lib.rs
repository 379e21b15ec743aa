//! Block storage for Hash Stream.
//!
//! Stores block bytes by multihash, independent of how blocks form files, and
//! holds the raw source files those blocks were encoded from.
//!
//! # Architecture
//!
//! - **PackStore**: content-addressed block bytes (memory and filesystem)
//! - **FileStore**: raw un-chunked source files by relative path
//! - **PackReader**: verified block reads with re-derivation from raw files
//!   for blocks that have not been packed yet

pub mod error;
pub mod fs;
pub mod memory;
pub mod reader;
pub mod traits;

pub use error::{PackError, PackResult};
pub use fs::{FsFileStore, FsPackStore};
pub use memory::{MemoryFileStore, MemoryPackStore};
pub use reader::PackReader;
pub use traits::{FileStore, PackStore, PathStream};
