//! Index stores: multiple records per multihash, deduplicated by content.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use hs_types::Multihash;

use crate::error::{IndexError, IndexResult};
use crate::record::IndexRecord;

/// Durable store of index records keyed by multihash.
///
/// All implementations must satisfy these invariants:
/// - Several distinct records may be stored under one key.
/// - Adding a record identical to one already stored is a no-op.
/// - `get` returns records in a stable order and an empty list for unknown keys.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn add(&self, key: &Multihash, record: &IndexRecord) -> IndexResult<()>;

    async fn get(&self, key: &Multihash) -> IndexResult<Vec<IndexRecord>>;
}

/// In-memory index store for tests and embedding.
pub struct MemoryIndexStore {
    records: RwLock<HashMap<Multihash, BTreeMap<String, IndexRecord>>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Total number of stored records across all keys.
    pub fn record_count(&self) -> usize {
        self.records
            .read()
            .expect("lock poisoned")
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    /// Drop every record under `key`. Returns `true` if any existed.
    pub fn remove(&self, key: &Multihash) -> bool {
        self.records
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some()
    }
}

impl Default for MemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndexStore")
            .field("key_count", &self.key_count())
            .finish()
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn add(&self, key: &Multihash, record: &IndexRecord) -> IndexResult<()> {
        let (name, _) = record.encode_named()?;
        self.records
            .write()
            .expect("lock poisoned")
            .entry(key.clone())
            .or_default()
            .entry(name)
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get(&self, key: &Multihash) -> IndexResult<Vec<IndexRecord>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map
            .get(key)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Index store laid out as `<root>/<multihash-hex>/<record-blake3>.idx`.
#[derive(Clone, Debug)]
pub struct FsIndexStore {
    root: PathBuf,
}

const RECORD_EXT: &str = "idx";

impl FsIndexStore {
    /// Open (creating if needed) an index store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> IndexResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &Multihash) -> PathBuf {
        self.root.join(key.to_hex())
    }

    async fn read_record(path: &Path, name: &str) -> IndexResult<IndexRecord> {
        let bytes = fs::read(path).await?;
        if blake3::hash(&bytes).to_hex().as_str() != name {
            return Err(IndexError::CorruptRecord {
                name: name.to_string(),
                reason: "content does not match record name".into(),
            });
        }
        IndexRecord::decode(&bytes).map_err(|e| IndexError::CorruptRecord {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl IndexStore for FsIndexStore {
    async fn add(&self, key: &Multihash, record: &IndexRecord) -> IndexResult<()> {
        let (name, bytes) = record.encode_named()?;
        let dir = self.key_dir(key);
        let dest = dir.join(format!("{name}.{RECORD_EXT}"));
        if fs::try_exists(&dest).await? {
            return Ok(());
        }

        fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::now_v7()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &dest).await?;

        tracing::debug!(key = %key.short_hex(), kind = record.kind(), "wrote index record");
        Ok(())
    }

    async fn get(&self, key: &Multihash) -> IndexResult<Vec<IndexRecord>> {
        let dir = self.key_dir(key);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push((stem.to_string(), path));
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for (name, path) in names {
            records.push(Self::read_record(&path, &name).await?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::{BlockRef, ContentId, HashAlgorithm, SourceSpan};

    fn blob(data: &[u8], path: &str) -> (Multihash, IndexRecord) {
        let mh = HashAlgorithm::Sha2_256.digest(data);
        let record = IndexRecord::Blob {
            block: BlockRef::new(
                ContentId::raw(mh.clone()),
                Some(SourceSpan::new(path, 0, data.len() as u64)),
            ),
        };
        (mh, record)
    }

    async fn exercise(store: &dyn IndexStore) {
        let (key, record) = blob(b"block", "a.bin");
        assert!(store.get(&key).await.unwrap().is_empty());

        store.add(&key, &record).await.unwrap();
        store.add(&key, &record).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), vec![record.clone()]);

        let (_, elsewhere) = blob(b"block", "b.bin");
        store.add(&key, &elsewhere).await.unwrap();
        let records = store.get(&key).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains(&record));
        assert!(records.contains(&elsewhere));
    }

    #[tokio::test]
    async fn memory_store_semantics() {
        let store = MemoryIndexStore::new();
        exercise(&store).await;
        assert_eq!(store.key_count(), 1);
        assert_eq!(store.record_count(), 2);
    }

    #[tokio::test]
    async fn fs_store_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path()).await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn fs_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (key, record) = blob(b"durable", "d.bin");
        FsIndexStore::open(dir.path())
            .await
            .unwrap()
            .add(&key, &record)
            .await
            .unwrap();
        let reopened = FsIndexStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get(&key).await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn fs_store_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::open(dir.path()).await.unwrap();
        let (key, record) = blob(b"x", "x.bin");
        store.add(&key, &record).await.unwrap();

        let key_dir = dir.path().join(key.to_hex());
        let file = std::fs::read_dir(&key_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        std::fs::write(&file, b"tampered").unwrap();
        let err = store.get(&key).await.unwrap_err();
        assert!(err.is_integrity());
    }
}
