use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hs_format::{Format, FormatEncoder, UnixFsOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN};
use hs_index::IndexScheme;
use hs_pipeline::PackingMode;
use hs_types::HashAlgorithm;

use crate::error::{SdkError, SdkResult};

pub const DEFAULT_STORE_PATH: &str = "~/.hash-stream-pipeline-server";

/// Which index scheduler backs the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// In-memory queue; pending tasks are lost on restart.
    #[default]
    Memory,
    /// Append-only log at `<store>/queue.log`.
    Durable,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Durable => f.write_str("durable"),
        }
    }
}

impl FromStr for SchedulerKind {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "durable" => Ok(Self::Durable),
            other => Err(SdkError::Config(format!("unknown scheduler: {other}"))),
        }
    }
}

/// Node configuration, usually loaded from TOML.
///
/// Only `raw_content_path` is required:
///
/// ```toml
/// raw_content_path = "/srv/files"
/// store_path = "~/.hash-stream"
/// packing = "lazy"
/// index_writers = ["single-level", "multiple-level"]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStreamConfig {
    #[serde(default)]
    pub format: Format,
    /// Root of the index, pack and bookkeeping stores.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Directory of files to index and to serve unpacked blocks from.
    pub raw_content_path: PathBuf,
    #[serde(default)]
    pub packing: PackingMode,
    #[serde(default = "default_index_writers")]
    pub index_writers: Vec<IndexScheme>,
    #[serde(default)]
    pub scheduler: SchedulerKind,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_children")]
    pub max_children: usize,
    #[serde(default = "default_hash")]
    pub hash: HashAlgorithm,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_index_writers() -> Vec<IndexScheme> {
    vec![IndexScheme::MultipleLevel]
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_children() -> usize {
    DEFAULT_MAX_CHILDREN
}

fn default_hash() -> HashAlgorithm {
    HashAlgorithm::Sha2_256
}

impl HashStreamConfig {
    pub fn new(store_path: impl Into<PathBuf>, raw_content_path: impl Into<PathBuf>) -> Self {
        Self {
            format: Format::default(),
            store_path: store_path.into(),
            raw_content_path: raw_content_path.into(),
            packing: PackingMode::default(),
            index_writers: default_index_writers(),
            scheduler: SchedulerKind::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_children: DEFAULT_MAX_CHILDREN,
            hash: default_hash(),
        }
    }

    pub fn from_toml_str(content: &str) -> SdkResult<Self> {
        toml::from_str(content).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.index_writers.is_empty() {
            return Err(SdkError::Config("at least one index writer is required".into()));
        }
        self.unixfs_options().validate()?;
        Ok(())
    }

    pub fn unixfs_options(&self) -> UnixFsOptions {
        UnixFsOptions {
            chunk_size: self.chunk_size,
            max_children: self.max_children,
            hash: self.hash,
        }
    }

    pub fn encoder(&self) -> SdkResult<FormatEncoder> {
        match self.format {
            Format::UnixFs => Ok(FormatEncoder::unixfs(self.unixfs_options())?),
        }
    }

    /// Copy of this config with both paths expanded (`~`) and made absolute.
    pub fn resolved(&self) -> SdkResult<Self> {
        Ok(Self {
            store_path: absolute(&self.store_path)?,
            raw_content_path: absolute(&self.raw_content_path)?,
            ..self.clone()
        })
    }

    pub fn index_path(&self) -> PathBuf {
        self.store_path.join("index")
    }

    pub fn pack_path(&self) -> PathBuf {
        self.store_path.join("pack")
    }

    pub fn synced_path(&self) -> PathBuf {
        self.store_path.join("file-synced")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.store_path.join("queue.log")
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn absolute(path: &Path) -> SdkResult<PathBuf> {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}
