use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use shot_core::errors::{ErrorInfo, ShotError};
use walkdir::WalkDir;

use crate::shot_file::ShotFile;

/// File extension of shot files.
pub const SHOT_EXTENSION: &str = "shot";

/// Read-only source of shot files shared by every worker of an aggregation.
pub trait ShotStore: Send + Sync + fmt::Debug {
    /// Lists available file identifiers in name order.
    fn list(&self) -> Result<Vec<String>, ShotError>;

    /// Loads a file by identifier.
    fn load(&self, file: &str) -> Result<ShotFile, ShotError>;

    /// Directory backing the store, when there is one.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Store reading `*.shot` files from a directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ShotError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ShotError::Store(
                ErrorInfo::new("data_dir", "data directory does not exist")
                    .with_context("path", root.display().to_string()),
            ));
        }
        Ok(Self { root })
    }

    /// Path of a file identifier.
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }
}

impl ShotStore for DirStore {
    fn list(&self) -> Result<Vec<String>, ShotError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| {
                ShotError::Store(
                    ErrorInfo::new("data_dir_walk", err.to_string())
                        .with_context("path", self.root.display().to_string()),
                )
            })?;
            let is_shot = entry
                .path()
                .extension()
                .map(|ext| ext == SHOT_EXTENSION)
                .unwrap_or(false);
            if entry.file_type().is_file() && is_shot {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self, file: &str) -> Result<ShotFile, ShotError> {
        let path = self.path_of(file);
        if !path.is_file() {
            return Err(ShotError::Store(
                ErrorInfo::new("missing_file", "shot file not found")
                    .with_context("file", file)
                    .with_context("path", path.display().to_string()),
            ));
        }
        ShotFile::read(&path)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

/// In-memory store, mostly for tests and synthetic runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, ShotFile>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, name: impl Into<String>, file: ShotFile) {
        self.files.insert(name.into(), file);
    }

    /// Adds a file, builder style.
    pub fn with(mut self, name: impl Into<String>, file: ShotFile) -> Self {
        self.insert(name, file);
        self
    }
}

impl FromIterator<(String, ShotFile)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, ShotFile)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl ShotStore for MemoryStore {
    fn list(&self) -> Result<Vec<String>, ShotError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn load(&self, file: &str) -> Result<ShotFile, ShotError> {
        self.files.get(file).cloned().ok_or_else(|| {
            ShotError::Store(
                ErrorInfo::new("missing_file", "shot file not found").with_context("file", file),
            )
        })
    }
}
