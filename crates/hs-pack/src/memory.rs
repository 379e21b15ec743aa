use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use hs_types::Multihash;

use crate::error::{PackError, PackResult};
use crate::traits::{check_existing, check_range, normalize_path, verify_put, FileStore, PackStore, PathStream};

/// In-memory pack store.
///
/// Intended for tests and embedding. Blocks are held behind a `RwLock`;
/// `Bytes` makes reads cheap clones.
pub struct MemoryPackStore {
    blocks: RwLock<HashMap<Multihash, Bytes>>,
}

impl MemoryPackStore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Remove a block. Returns `true` if it was present.
    pub fn remove(&self, key: &Multihash) -> bool {
        self.blocks.write().expect("lock poisoned").remove(key).is_some()
    }

    /// Store bytes without verification, replacing any existing entry.
    ///
    /// Only useful for simulating on-disk corruption.
    pub fn insert_unchecked(&self, key: Multihash, bytes: impl Into<Bytes>) {
        self.blocks
            .write()
            .expect("lock poisoned")
            .insert(key, bytes.into());
    }
}

impl Default for MemoryPackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryPackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPackStore")
            .field("block_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl PackStore for MemoryPackStore {
    async fn put(&self, key: &Multihash, bytes: Bytes) -> PackResult<()> {
        verify_put(key, &bytes)?;
        let mut map = self.blocks.write().expect("lock poisoned");
        match map.get(key) {
            Some(existing) => check_existing(key, existing, &bytes),
            None => {
                map.insert(key.clone(), bytes);
                Ok(())
            }
        }
    }

    async fn get(&self, key: &Multihash) -> PackResult<Option<Bytes>> {
        Ok(self.blocks.read().expect("lock poisoned").get(key).cloned())
    }

    async fn has(&self, key: &Multihash) -> PackResult<bool> {
        Ok(self.blocks.read().expect("lock poisoned").contains_key(key))
    }
}

/// In-memory file store.
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.files.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().expect("lock poisoned").is_empty()
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().expect("lock poisoned").remove(path).is_some()
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFileStore")
            .field("file_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    fn list(&self) -> PathStream {
        // Snapshot: files added after listing starts are not observed.
        let paths: Vec<String> = self
            .files
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        stream::iter(paths.into_iter().map(Ok)).boxed()
    }

    async fn get(&self, path: &str) -> PackResult<Option<Bytes>> {
        normalize_path(path)?;
        Ok(self.files.read().expect("lock poisoned").get(path).cloned())
    }

    async fn get_range(&self, path: &str, offset: u64, length: u64) -> PackResult<Option<Bytes>> {
        normalize_path(path)?;
        let map = self.files.read().expect("lock poisoned");
        let Some(bytes) = map.get(path) else {
            return Ok(None);
        };
        check_range(path, offset, length, bytes.len() as u64)?;
        let start = offset as usize;
        Ok(Some(bytes.slice(start..start + length as usize)))
    }

    async fn put(&self, path: &str, bytes: Bytes) -> PackResult<()> {
        normalize_path(path)?;
        self.files
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), bytes);
        Ok(())
    }
}
