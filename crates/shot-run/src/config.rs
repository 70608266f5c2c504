use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_store::AliasMap;

/// YAML description of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human readable run name.
    pub name: String,
    /// Directory holding the run's `*.shot` files.
    pub data_dir: PathBuf,
    /// Explicit file list; every shot file in `data_dir` when absent.
    #[serde(default)]
    pub files: Option<Vec<String>>,
    /// Keyword aliases.
    #[serde(default)]
    pub aliases: AliasMap,
    /// Classifier parameters.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Dataset holding the shot indices.
    #[serde(default = "default_shot_index_dataset")]
    pub shot_index_dataset: String,
    /// Dataset holding the per-file source period.
    #[serde(default = "default_source_period_dataset")]
    pub source_period_dataset: String,
}

fn default_shot_index_dataset() -> String {
    "bunches".to_string()
}

fn default_source_period_dataset() -> String {
    "Background_Period".to_string()
}

impl RunConfig {
    /// Minimal configuration over a data directory.
    pub fn new(name: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            data_dir: data_dir.into(),
            files: None,
            aliases: AliasMap::default(),
            classifier: ClassifierConfig::default(),
            shot_index_dataset: default_shot_index_dataset(),
            source_period_dataset: default_source_period_dataset(),
        }
    }
}

/// Periodic source and modulator classification parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Phase at which the source is off.
    #[serde(default)]
    pub source_offset: i64,
    /// Overrides the per-file source period dataset when set.
    #[serde(default)]
    pub source_period: Option<i64>,
    /// Modulator period.
    #[serde(default = "default_modulator_period")]
    pub modulator_period: i64,
    /// Phase at which the modulator is off; detected from the reference when absent.
    #[serde(default)]
    pub modulator_offset: Option<i64>,
    /// Keyword of the modulator reference signal.
    #[serde(default = "default_modulator_reference")]
    pub modulator_reference: String,
}

fn default_modulator_period() -> i64 {
    2
}

fn default_modulator_reference() -> String {
    "slu".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            source_offset: 0,
            source_period: None,
            modulator_period: default_modulator_period(),
            modulator_offset: None,
            modulator_reference: default_modulator_reference(),
        }
    }
}

/// YAML description of a run set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSetConfig {
    /// Member runs in order.
    pub runs: Vec<RunConfig>,
    /// Aliases shared by every run; a run's own aliases take precedence.
    #[serde(default)]
    pub aliases: AliasMap,
}

/// Options of a single averaging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AverageOpts {
    /// Look up cached results before computing.
    pub use_cache: bool,
    /// Persist computed results.
    pub make_cache: bool,
    /// Files per cache block; one block of all files when absent.
    pub block_size: Option<usize>,
    /// Persist blocks holding fewer than `block_size` files.
    pub save_incomplete: bool,
    /// Persist the whole-run result.
    pub save_total: bool,
    /// Worker threads.
    pub workers: usize,
}

impl Default for AverageOpts {
    fn default() -> Self {
        Self {
            use_cache: true,
            make_cache: true,
            block_size: None,
            save_incomplete: false,
            save_total: true,
            workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
        }
    }
}

impl AverageOpts {
    /// Options that neither read nor write the cache.
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            make_cache: false,
            ..Self::default()
        }
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ShotError> {
    let bytes = fs::read(path).map_err(|err| {
        ShotError::Config(
            ErrorInfo::new("config_read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    serde_yaml::from_slice(&bytes).map_err(|err| {
        ShotError::Config(
            ErrorInfo::new("config_parse", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Loads a [`RunConfig`] from a YAML file.
pub fn load_run_config(path: &Path) -> Result<RunConfig, ShotError> {
    load_yaml(path)
}

/// Loads a [`RunSetConfig`] from a YAML file.
pub fn load_run_set_config(path: &Path) -> Result<RunSetConfig, ShotError> {
    load_yaml(path)
}

/// Serializes a configuration back to YAML.
pub fn to_yaml_string<T: Serialize>(config: &T) -> Result<String, ShotError> {
    serde_yaml::to_string(config)
        .map_err(|err| ShotError::Serde(ErrorInfo::new("yaml_serialize", err.to_string())))
}
