//! Filesystem-backed pack and file stores.
//!
//! Both stores write through a temp file in `<root>/.tmp/` and rename into
//! place, so readers never observe a partially written file.

use std::collections::VecDeque;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use hs_types::Multihash;

use crate::error::{PackError, PackResult};
use crate::traits::{check_existing, check_range, normalize_path, verify_put, FileStore, PackStore, PathStream};

const TMP_DIR: &str = ".tmp";

/// Write `bytes` to `dest` atomically via `<root>/.tmp`.
async fn write_atomic(root: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_dir = root.join(TMP_DIR);
    fs::create_dir_all(&tmp_dir).await?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_dir.join(uuid::Uuid::now_v7().to_string());
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    if let Err(err) = fs::rename(&tmp, dest).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(())
}

async fn read_optional(path: &Path) -> PackResult<Option<Bytes>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(Bytes::from(data))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Pack store laid out as `<root>/<digest-hex[0..2]>/<multihash-hex>.pack`.
#[derive(Clone, Debug)]
pub struct FsPackStore {
    root: PathBuf,
}

impl FsPackStore {
    /// Open (creating if needed) a pack store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> PackResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, key: &Multihash) -> PathBuf {
        let digest = hex::encode(key.digest());
        let shard = digest.get(..2).unwrap_or("00");
        self.root.join(shard).join(format!("{}.pack", key.to_hex()))
    }
}

#[async_trait]
impl PackStore for FsPackStore {
    async fn put(&self, key: &Multihash, bytes: Bytes) -> PackResult<()> {
        verify_put(key, &bytes)?;
        let path = self.block_path(key);
        if let Some(existing) = read_optional(&path).await? {
            return check_existing(key, &existing, &bytes);
        }
        write_atomic(&self.root, &path, &bytes).await?;
        tracing::debug!(key = %key.short_hex(), bytes = bytes.len(), "packed block");
        Ok(())
    }

    async fn get(&self, key: &Multihash) -> PackResult<Option<Bytes>> {
        read_optional(&self.block_path(key)).await
    }

    async fn has(&self, key: &Multihash) -> PackResult<bool> {
        Ok(fs::try_exists(self.block_path(key)).await?)
    }
}

/// File store over a plain directory tree.
///
/// Entries whose name starts with `.` are skipped when listing.
#[derive(Clone, Debug)]
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub async fn open(root: impl Into<PathBuf>) -> PackResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> PackResult<PathBuf> {
        let parts = normalize_path(path)?;
        Ok(parts.iter().fold(self.root.clone(), |acc, p| acc.join(p)))
    }
}

fn relative_path(root: &Path, path: &Path) -> PackResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PackError::InvalidPath(path.display().to_string()))?;
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| PackError::InvalidPath(path.display().to_string()))
        })
        .collect::<PackResult<Vec<_>>>()?;
    Ok(parts.join("/"))
}

#[async_trait]
impl FileStore for FsFileStore {
    fn list(&self) -> PathStream {
        let root = self.root.clone();
        let pending = VecDeque::from([root.clone()]);
        stream::try_unfold((root, pending), |(root, mut pending)| async move {
            while let Some(path) = pending.pop_front() {
                let meta = match fs::metadata(&path).await {
                    Ok(meta) => meta,
                    // Removed between listing its directory and visiting it.
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => return Err(PackError::from(err)),
                };
                if meta.is_dir() {
                    let mut entries = Vec::new();
                    let mut dir = fs::read_dir(&path).await?;
                    while let Some(entry) = dir.next_entry().await? {
                        if entry.file_name().to_string_lossy().starts_with('.') {
                            continue;
                        }
                        entries.push(entry.path());
                    }
                    entries.sort();
                    for entry in entries.into_iter().rev() {
                        pending.push_front(entry);
                    }
                } else if meta.is_file() {
                    let rel = relative_path(&root, &path)?;
                    return Ok(Some((rel, (root, pending))));
                }
            }
            Ok::<_, PackError>(None)
        })
        .boxed()
    }

    async fn get(&self, path: &str) -> PackResult<Option<Bytes>> {
        read_optional(&self.file_path(path)?).await
    }

    async fn get_range(&self, path: &str, offset: u64, length: u64) -> PackResult<Option<Bytes>> {
        let full = self.file_path(path)?;
        let mut file = match fs::File::open(&full).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let size = file.metadata().await?.len();
        check_range(path, offset, length, size)?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;
        Ok(Some(Bytes::from(buf)))
    }

    async fn put(&self, path: &str, bytes: Bytes) -> PackResult<()> {
        let full = self.file_path(path)?;
        write_atomic(&self.root, &full, &bytes).await?;
        Ok(())
    }
}
