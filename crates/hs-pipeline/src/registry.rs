//! Record of which file store paths have been indexed.
//!
//! A path is recorded only after its file was processed and every index
//! writer succeeded, so a file that was queued but never processed, or that
//! failed, is picked up again by the next scan.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::fs;

use crate::error::PipelineResult;

#[async_trait]
pub trait IndexedFiles: Send + Sync {
    async fn is_indexed(&self, path: &str) -> PipelineResult<bool>;

    async fn mark_indexed(&self, path: &str) -> PipelineResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryIndexedFiles {
    paths: RwLock<HashSet<String>>,
}

impl MemoryIndexedFiles {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexedFiles for MemoryIndexedFiles {
    async fn is_indexed(&self, path: &str) -> PipelineResult<bool> {
        Ok(self.paths.read().expect("lock poisoned").contains(path))
    }

    async fn mark_indexed(&self, path: &str) -> PipelineResult<()> {
        self.paths
            .write()
            .expect("lock poisoned")
            .insert(path.to_string());
        Ok(())
    }
}

/// One marker file per indexed path, named by the BLAKE3 of the path and
/// holding the path itself.
#[derive(Clone, Debug)]
pub struct FsIndexedFiles {
    root: PathBuf,
}

impl FsIndexedFiles {
    pub async fn open(root: impl Into<PathBuf>) -> PipelineResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn marker(&self, path: &str) -> PathBuf {
        self.root
            .join(format!("{}.synced", blake3::hash(path.as_bytes()).to_hex()))
    }
}

#[async_trait]
impl IndexedFiles for FsIndexedFiles {
    async fn is_indexed(&self, path: &str) -> PipelineResult<bool> {
        match fs::read(self.marker(path)).await {
            Ok(contents) => Ok(contents == path.as_bytes()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_indexed(&self, path: &str) -> PipelineResult<()> {
        fs::write(self.marker(path), path.as_bytes()).await?;
        Ok(())
    }
}
