//! Index writers: persist how a root decomposes into blocks.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hs_format::{BlockDag, DagNode};
use hs_types::{BlockRef, ContentId, Multihash};

use crate::error::{IndexError, IndexResult};
use crate::record::{IndexRecord, Link};
use crate::store::IndexStore;

/// Which record shape a writer produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexScheme {
    SingleLevel,
    MultipleLevel,
}

impl IndexScheme {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SingleLevel => "single-level",
            Self::MultipleLevel => "multiple-level",
        }
    }
}

impl fmt::Display for IndexScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-level" => Ok(Self::SingleLevel),
            "multiple-level" => Ok(Self::MultipleLevel),
            other => Err(format!("unknown index scheme: {other}")),
        }
    }
}

/// Persists index records for an encoded DAG.
///
/// Writing the same DAG twice leaves the store unchanged. Records reachable
/// from the root are written before the root's own record, so a reader never
/// finds a root whose records are still missing.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    fn scheme(&self) -> IndexScheme;

    /// Index `dag` under `root`. When `source` is given, blocks carry their
    /// span of that file store path as a location hint.
    async fn write(&self, root: &ContentId, dag: &BlockDag, source: Option<&str>) -> IndexResult<()>;
}

fn block_ref(node: &DagNode, source: Option<&str>) -> BlockRef {
    BlockRef::new(node.cid().clone(), source.map(|path| node.span(path)))
}

fn check_root(root: &ContentId, dag: &BlockDag) -> IndexResult<()> {
    if root.multihash() != dag.root_cid().multihash() {
        return Err(IndexError::Integrity {
            cid: root.clone(),
            reason: format!("DAG root is {}", dag.root_cid()),
        });
    }
    Ok(())
}

/// Write a `Blob` record for each distinct block among `nodes`.
async fn write_blobs<'a>(
    store: &dyn IndexStore,
    nodes: impl Iterator<Item = &'a DagNode>,
    source: Option<&str>,
) -> IndexResult<usize> {
    let mut seen: HashSet<&Multihash> = HashSet::new();
    for node in nodes {
        if !seen.insert(node.cid().multihash()) {
            continue;
        }
        let record = IndexRecord::Blob {
            block: block_ref(node, source),
        };
        store.add(node.cid().multihash(), &record).await?;
    }
    Ok(seen.len())
}

/// Flattens the whole DAG into one record under the root.
pub struct SingleLevelIndexWriter {
    store: Arc<dyn IndexStore>,
}

impl SingleLevelIndexWriter {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IndexWriter for SingleLevelIndexWriter {
    fn scheme(&self) -> IndexScheme {
        IndexScheme::SingleLevel
    }

    async fn write(&self, root: &ContentId, dag: &BlockDag, source: Option<&str>) -> IndexResult<()> {
        check_root(root, dag)?;
        let blobs = write_blobs(self.store.as_ref(), dag.walk(), source).await?;

        let root_node = dag.root();
        let record = IndexRecord::Flat {
            root: BlockRef::new(root.clone(), source.map(|p| root_node.span(p))),
            blocks: dag.walk().skip(1).map(|n| block_ref(n, source)).collect(),
        };
        self.store.add(root.multihash(), &record).await?;

        tracing::debug!(%root, blobs, blocks = dag.len(), "wrote single-level index");
        Ok(())
    }
}

/// Mirrors the DAG: one record per internal node, leaves located directly.
pub struct MultipleLevelIndexWriter {
    store: Arc<dyn IndexStore>,
}

impl MultipleLevelIndexWriter {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IndexWriter for MultipleLevelIndexWriter {
    fn scheme(&self) -> IndexScheme {
        IndexScheme::MultipleLevel
    }

    async fn write(&self, root: &ContentId, dag: &BlockDag, source: Option<&str>) -> IndexResult<()> {
        check_root(root, dag)?;
        let blobs = write_blobs(self.store.as_ref(), dag.leaves(), source).await?;

        // Reverse pre-order: every node is written after all of its descendants.
        let internal: Vec<&DagNode> = dag.internal_nodes().collect();
        let mut written: HashSet<&Multihash> = HashSet::new();
        for node in internal.iter().rev() {
            if !written.insert(node.cid().multihash()) {
                continue;
            }
            let links = dag
                .children(node)
                .map(|child| {
                    if child.is_leaf() {
                        Link::Leaf(block_ref(child, source))
                    } else {
                        Link::Subtree(child.cid().clone())
                    }
                })
                .collect();
            let block = if node.cid().multihash() == root.multihash() {
                BlockRef::new(root.clone(), source.map(|p| node.span(p)))
            } else {
                block_ref(node, source)
            };
            let record = IndexRecord::Node { block, links };
            self.store.add(node.cid().multihash(), &record).await?;
        }

        tracing::debug!(%root, blobs, nodes = written.len(), "wrote multiple-level index");
        Ok(())
    }
}

/// Build the writer for `scheme` over `store`.
pub fn writer_for(scheme: IndexScheme, store: Arc<dyn IndexStore>) -> Arc<dyn IndexWriter> {
    match scheme {
        IndexScheme::SingleLevel => Arc::new(SingleLevelIndexWriter::new(store)),
        IndexScheme::MultipleLevel => Arc::new(MultipleLevelIndexWriter::new(store)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIndexStore;
    use hs_format::{FormatEncoder, UnixFsOptions};
    use hs_types::{Codec, HashAlgorithm};

    fn dag_of(data: &[u8]) -> BlockDag {
        FormatEncoder::unixfs(UnixFsOptions {
            chunk_size: 8,
            max_children: 3,
            hash: HashAlgorithm::Sha2_256,
        })
        .unwrap()
        .encode(data)
    }

    #[test]
    fn scheme_names() {
        assert_eq!("single-level".parse::<IndexScheme>().unwrap(), IndexScheme::SingleLevel);
        assert_eq!(IndexScheme::MultipleLevel.to_string(), "multiple-level");
        assert!("flat".parse::<IndexScheme>().is_err());
    }

    #[tokio::test]
    async fn single_level_writes_flat_root_and_blobs() {
        let store = Arc::new(MemoryIndexStore::new());
        let writer = SingleLevelIndexWriter::new(store.clone());
        let data: Vec<u8> = (0..50u8).collect();
        let dag = dag_of(&data);
        let root = dag.root_cid().clone();
        writer.write(&root, &dag, Some("f.bin")).await.unwrap();

        let records = store.get(root.multihash()).await.unwrap();
        let flat = records
            .iter()
            .find_map(|r| match r {
                IndexRecord::Flat { root, blocks } => Some((root, blocks)),
                _ => None,
            })
            .unwrap();
        assert_eq!(flat.0.cid, root);
        assert_eq!(flat.1.len(), dag.len() - 1);
        assert_eq!(store.key_count(), dag.len());
    }

    #[tokio::test]
    async fn multiple_level_writes_node_per_internal_block() {
        let store = Arc::new(MemoryIndexStore::new());
        let writer = MultipleLevelIndexWriter::new(store.clone());
        let data: Vec<u8> = (0..100u8).collect();
        let dag = dag_of(&data);
        let root = dag.root_cid().clone();
        writer.write(&root, &dag, Some("f.bin")).await.unwrap();

        for node in dag.internal_nodes() {
            let records = store.get(node.cid().multihash()).await.unwrap();
            assert!(records.iter().any(|r| matches!(r, IndexRecord::Node { .. })));
        }
        for leaf in dag.leaves() {
            let records = store.get(leaf.cid().multihash()).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].block().cid.codec(), Codec::Raw);
        }
    }

    #[tokio::test]
    async fn writers_are_idempotent() {
        let data: Vec<u8> = (0..77u8).collect();
        let dag = dag_of(&data);
        let root = dag.root_cid().clone();
        for scheme in [IndexScheme::SingleLevel, IndexScheme::MultipleLevel] {
            let store = Arc::new(MemoryIndexStore::new());
            let writer = writer_for(scheme, store.clone());
            writer.write(&root, &dag, Some("f.bin")).await.unwrap();
            let first = store.record_count();
            writer.write(&root, &dag, Some("f.bin")).await.unwrap();
            assert_eq!(store.record_count(), first, "{scheme} duplicated records");
        }
    }

    #[tokio::test]
    async fn mismatched_root_rejected() {
        let store = Arc::new(MemoryIndexStore::new());
        let dag = dag_of(b"some bytes");
        let other = ContentId::dag_pb(HashAlgorithm::Sha2_256.digest(b"other"));
        for scheme in [IndexScheme::SingleLevel, IndexScheme::MultipleLevel] {
            let err = writer_for(scheme, store.clone())
                .write(&other, &dag, None)
                .await
                .unwrap_err();
            assert!(err.is_integrity());
        }
        assert_eq!(store.record_count(), 0);
    }
}
