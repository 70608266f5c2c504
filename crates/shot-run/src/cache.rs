//! Content-addressed cache of aggregation results.
//!
//! Artifacts live under `work/<operation>_cache/<key>.bin`, next to the
//! `rawdata` directory holding the shot files. Keys hash file *paths*, never
//! contents, so a file rewritten in place after caching yields a stale hit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::provenance::{ArtifactProvenance, SchemaVersion};

use crate::canonical::stable_hash_string;
use crate::classify::Splits;
use crate::compile::Query;
use crate::slice::SliceSpec;

/// Operation name of weighted-average artifacts.
pub const AVERAGE_OPERATION: &str = "average_run_data_weights";
/// Operation name of raw bucket collections.
pub const COLLECT_OPERATION: &str = "get_rundata";
/// Schema of cache artifacts.
pub const CACHE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

const ARTIFACT_EXTENSION: &str = "bin";

fn cache_error(code: &str, err: impl ToString, path: &Path) -> ShotError {
    ShotError::Cache(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    operation: &'a str,
    files: Vec<String>,
    quantity: &'a str,
    splits: Splits,
    slice: &'a SliceSpec,
    rules: &'a [Option<String>],
}

/// Content key of `operation` over the ordered `files` for `query`.
///
/// Files are keyed by their path below `location`, so equally named files of
/// two data directories sharing one work directory never share a key.
pub fn cache_key(
    operation: &str,
    location: Option<&Path>,
    files: &[String],
    query: &Query,
) -> Result<String, ShotError> {
    let files = files
        .iter()
        .map(|file| match location {
            Some(dir) => dir.join(file).to_string_lossy().into_owned(),
            None => file.clone(),
        })
        .collect();
    stable_hash_string(&KeyMaterial {
        operation,
        files,
        quantity: &query.quantity,
        splits: query.splits,
        slice: &query.slice,
        rules: &query.rules,
    })
}

/// Work directory for a data directory.
///
/// `/beam/rawdata/run_07` maps to `/beam/work`; without a `rawdata` ancestor
/// the work directory sits next to the data directory.
pub fn work_dir_for(data_dir: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in data_dir.components() {
        if component == Component::Normal("rawdata".as_ref()) {
            return prefix.join("work");
        }
        prefix.push(component);
    }
    match data_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("work"),
        _ => data_dir.join("work"),
    }
}

/// Persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheArtifact<T> {
    /// Artifact schema.
    pub schema: SchemaVersion,
    /// Key, files and creation time.
    pub provenance: ArtifactProvenance,
    /// Cached value.
    pub value: T,
}

/// One artifact read or written during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Artifact path.
    pub path: PathBuf,
    /// Files covered by the artifact.
    pub files: Vec<String>,
}

/// Artifacts saved and loaded by one aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Artifacts written.
    pub saved: Vec<CacheRecord>,
    /// Artifacts reused.
    pub loaded: Vec<CacheRecord>,
}

impl CacheInfo {
    pub(crate) fn record_saved(&mut self, path: PathBuf, files: &[String]) {
        self.saved.push(CacheRecord {
            path,
            files: files.to_vec(),
        });
    }

    pub(crate) fn record_loaded(&mut self, path: PathBuf, files: &[String]) {
        self.loaded.push(CacheRecord {
            path,
            files: files.to_vec(),
        });
    }
}

/// Reads and writes artifacts below a work directory.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
}

impl CacheManager {
    /// Manager rooted at a work directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Work directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one operation's artifacts.
    pub fn operation_dir(&self, operation: &str) -> PathBuf {
        self.root.join(format!("{operation}_cache"))
    }

    /// Artifact path of `key`.
    pub fn path(&self, operation: &str, key: &str) -> PathBuf {
        self.operation_dir(operation)
            .join(format!("{key}.{ARTIFACT_EXTENSION}"))
    }

    /// Loads an artifact; missing, unreadable or foreign artifacts are misses.
    pub fn load<T: DeserializeOwned>(&self, operation: &str, key: &str) -> Option<CacheArtifact<T>> {
        let path = self.path(operation, key);
        if !path.is_file() {
            return None;
        }
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("cache artifact {} unreadable: {err}; recomputing", path.display());
                return None;
            }
        };
        let artifact: CacheArtifact<T> = match bincode::deserialize(&bytes) {
            Ok(artifact) => artifact,
            Err(err) => {
                log::warn!("cache artifact {} is corrupt: {err}; recomputing", path.display());
                return None;
            }
        };
        if !CACHE_SCHEMA.reads(&artifact.schema) || artifact.provenance.key != key {
            log::warn!(
                "cache artifact {} has schema {} and key {}; recomputing",
                path.display(),
                artifact.schema,
                artifact.provenance.key
            );
            return None;
        }
        log::debug!("cache hit {}", path.display());
        Some(artifact)
    }

    /// Writes an artifact and returns its path.
    pub fn save<T: Serialize>(
        &self,
        operation: &str,
        key: &str,
        files: &[String],
        value: &T,
    ) -> Result<PathBuf, ShotError> {
        let dir = self.operation_dir(operation);
        fs::create_dir_all(&dir).map_err(|err| cache_error("cache_mkdir", err, &dir))?;
        let path = self.path(operation, key);
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        let artifact = CacheArtifact {
            schema: CACHE_SCHEMA,
            provenance: ArtifactProvenance {
                key: key.to_string(),
                files: files.to_vec(),
                created_at: Utc::now().to_rfc3339(),
                tool_versions,
            },
            value,
        };
        let bytes =
            bincode::serialize(&artifact).map_err(|err| cache_error("cache_serialize", err, &path))?;
        fs::write(&path, bytes).map_err(|err| cache_error("cache_write", err, &path))?;
        log::debug!("cache saved {}", path.display());
        Ok(path)
    }
}

/// Contiguous group of files cached together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Files of the block, in run order.
    pub files: Vec<String>,
    /// Whether the block holds exactly `block_size` files.
    pub complete: bool,
}

/// Splits `files` into `⌈N/k⌉` contiguous blocks; one complete block without `k`.
pub fn plan_blocks(files: &[String], block_size: Option<usize>) -> Result<Vec<Block>, ShotError> {
    match block_size {
        None => Ok(vec![Block {
            files: files.to_vec(),
            complete: true,
        }]),
        Some(0) => Err(ShotError::Config(ErrorInfo::new(
            "block_size",
            "block size must be positive",
        ))),
        Some(size) => Ok(files
            .chunks(size)
            .map(|chunk| Block {
                files: chunk.to_vec(),
                complete: chunk.len() == size,
            })
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_sits_next_to_rawdata() {
        assert_eq!(
            work_dir_for(Path::new("/beam/rawdata/run_07")),
            PathBuf::from("/beam/work")
        );
        assert_eq!(
            work_dir_for(Path::new("/beam/rawdata")),
            PathBuf::from("/beam/work")
        );
        assert_eq!(
            work_dir_for(Path::new("/scratch/run_07")),
            PathBuf::from("/scratch/work")
        );
    }

    #[test]
    fn blocks_flag_completeness() {
        let files: Vec<String> = (0..5).map(|i| format!("f{i}")).collect();
        let blocks = plan_blocks(&files, Some(2)).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].complete && blocks[1].complete);
        assert!(!blocks[2].complete);
        let single = plan_blocks(&files[..1], Some(3)).unwrap();
        assert_eq!(single.len(), 1);
        assert!(!single[0].complete);
        assert_eq!(plan_blocks(&files, Some(0)).unwrap_err().code(), "block_size");
    }
}
