//! DAG formats for Hash Stream.
//!
//! A format turns the bytes of a file into a DAG of content-addressed blocks
//! and can rebuild any single block from the source bytes it covers.
//!
//! # Architecture
//!
//! - **Format** / **FormatEncoder**: named formats and their configured encoders
//! - **UnixFsEncoder**: fixed-size raw leaves under a balanced dag-pb tree
//! - **BlockDag**: encoded blocks in pre-order with their source spans
//! - **UnixFsExporter**: verified reassembly of a file from its blocks
//! - **pb**: dag-pb and UnixFS protobuf codecs

pub mod dag;
pub mod error;
pub mod exporter;
pub mod format;
pub mod pb;
pub mod unixfs;

pub use dag::{BlockDag, DagNode};
pub use error::{FormatError, FormatResult};
pub use exporter::{block_links, UnixFsExporter};
pub use format::{Format, FormatEncoder};
pub use unixfs::{UnixFsEncoder, UnixFsOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN};
