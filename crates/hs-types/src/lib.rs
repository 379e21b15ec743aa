//! Foundation types for Hash Stream.
//!
//! Every other Hash Stream crate depends on `hs-types`. It defines how
//! content is named and where its bytes can be found.
//!
//! # Key Types
//!
//! - [`ContentId`]: CIDv1: codec tag plus [`Multihash`]
//! - [`Multihash`]: self-describing digest; the key of every store
//! - [`HashAlgorithm`]: sha2-256 or blake3 (identity digests embed their payload)
//! - [`Block`]: identifier plus bytes
//! - [`BlockRef`] / [`SourceSpan`]: location hints carried by index records

pub mod block;
pub mod cid;
pub mod error;
pub mod location;
pub mod multihash;

pub use block::Block;
pub use cid::{Codec, ContentId};
pub use error::TypeError;
pub use location::{BlockRef, SourceSpan};
pub use multihash::{HashAlgorithm, Multihash, MAX_DIGEST_LEN};
