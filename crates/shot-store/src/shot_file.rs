use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::provenance::SchemaVersion;
use shot_core::NdArray;

use crate::dataset::Dataset;

/// Schema written into every shot file.
pub const SHOT_FILE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

fn file_error(code: &str, err: impl ToString, path: &Path) -> ShotError {
    ShotError::Store(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Contents of one `*.shot` file: named datasets keyed by their path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotFile {
    schema: SchemaVersion,
    datasets: BTreeMap<String, Dataset>,
}

impl Default for ShotFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ShotFile {
    /// Creates an empty file.
    pub fn new() -> Self {
        Self {
            schema: SHOT_FILE_SCHEMA,
            datasets: BTreeMap::new(),
        }
    }

    /// Adds a dataset, builder style.
    pub fn with(mut self, name: impl Into<String>, dataset: impl Into<Dataset>) -> Self {
        self.insert(name, dataset);
        self
    }

    /// Adds or replaces a dataset.
    pub fn insert(&mut self, name: impl Into<String>, dataset: impl Into<Dataset>) {
        self.datasets.insert(name.into(), dataset.into());
    }

    /// Schema the file was written with.
    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    /// Looks up a dataset by path.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }

    /// Looks up a numeric dataset by path.
    pub fn numeric(&self, name: &str) -> Option<&NdArray> {
        self.datasets.get(name).and_then(Dataset::as_numeric)
    }

    /// Iterates over datasets in name order.
    pub fn datasets(&self) -> impl Iterator<Item = (&str, &Dataset)> + '_ {
        self.datasets.iter().map(|(name, dataset)| (name.as_str(), dataset))
    }

    /// Reads the shot-index dataset as integers.
    pub fn shot_indices(&self, name: &str) -> Result<Vec<i64>, ShotError> {
        let array = self.numeric(name).ok_or_else(|| {
            ShotError::Store(
                ErrorInfo::new("missing_shot_index", "shot index dataset not found")
                    .with_context("dataset", name),
            )
        })?;
        Ok(array.data().iter().map(|value| value.round() as i64).collect())
    }

    /// Encodes the file with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ShotError> {
        bincode::serialize(self)
            .map_err(|err| ShotError::Serde(ErrorInfo::new("shot_serialize", err.to_string())))
    }

    /// Decodes a bincode payload and checks its schema.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShotError> {
        let file: ShotFile = bincode::deserialize(bytes)
            .map_err(|err| ShotError::Serde(ErrorInfo::new("shot_deserialize", err.to_string())))?;
        if !SHOT_FILE_SCHEMA.reads(&file.schema) {
            return Err(ShotError::Serde(
                ErrorInfo::new("shot_schema", "unsupported shot file schema")
                    .with_context("major", file.schema.major.to_string()),
            ));
        }
        Ok(file)
    }

    /// Reads a shot file from disk.
    pub fn read(path: &Path) -> Result<Self, ShotError> {
        let bytes = fs::read(path).map_err(|err| file_error("shot_read", err, path))?;
        Self::from_bytes(&bytes)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Writes the file to disk, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ShotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| file_error("shot_mkdir", err, parent))?;
        }
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|err| file_error("shot_write", err, path))
    }
}
