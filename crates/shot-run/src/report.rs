//! JSON summaries of aggregation results written by the command line front-end.

use serde::{Deserialize, Serialize};
use shot_core::errors::ShotError;
use shot_stats::WeightedAverage;

use crate::cache::CacheInfo;
use crate::canonical::stable_hash_string;
use crate::compile::Query;
use crate::runset::RunSetAverage;

/// Averages and weights of one run (or the combination of all runs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageEntry {
    /// Run name, or `combined`.
    pub name: String,
    /// Shape of the data held by each bucket.
    pub data_shape: Vec<usize>,
    /// Weights in bucket order.
    pub weights: Vec<f64>,
    /// Averages, row-major over `bucket_shape ++ data_shape`.
    pub average: Vec<f64>,
    /// Artifacts loaded from the cache; not part of the report hash.
    pub cache_loaded: usize,
    /// Artifacts written to the cache; not part of the report hash.
    pub cache_saved: usize,
}

#[derive(Serialize)]
struct HashedEntry<'a> {
    name: &'a str,
    data_shape: &'a [usize],
    weights: &'a [f64],
    average: &'a [f64],
}

impl AverageEntry {
    fn new(name: impl Into<String>, average: &WeightedAverage, cache: Option<&CacheInfo>) -> Self {
        Self {
            name: name.into(),
            data_shape: average.data_shape().to_vec(),
            weights: average.weights.data().to_vec(),
            average: average.average.data().to_vec(),
            cache_loaded: cache.map(|info| info.loaded.len()).unwrap_or(0),
            cache_saved: cache.map(|info| info.saved.len()).unwrap_or(0),
        }
    }

    fn hashed(&self) -> HashedEntry<'_> {
        HashedEntry {
            name: &self.name,
            data_shape: &self.data_shape,
            weights: &self.weights,
            average: &self.average,
        }
    }
}

/// Serializable result of an `average` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageReport {
    /// Aggregated quantity.
    pub quantity: String,
    /// Selection rules, `null` for select-all.
    pub rules: Vec<Option<String>>,
    /// Whether the source split was active.
    pub source_split: bool,
    /// Whether the modulator split was active.
    pub modulator_split: bool,
    /// Slices in `start:stop:step` form.
    pub slice: String,
    /// `[4, rules]`.
    pub bucket_shape: Vec<usize>,
    /// One entry per run.
    pub runs: Vec<AverageEntry>,
    /// Fold of every run, when requested.
    pub combined: Option<AverageEntry>,
    /// Content hash of the query and the numbers above, cache counters excluded.
    pub report_hash: String,
}

#[derive(Serialize)]
struct HashedFields<'a> {
    query: &'a Query,
    runs: Vec<HashedEntry<'a>>,
    combined: Option<HashedEntry<'a>>,
}

impl AverageReport {
    /// Builds the report of a run-set average, folding the runs when `combine` is set.
    pub fn build(query: &Query, result: &RunSetAverage, combine: bool) -> Result<Self, ShotError> {
        let runs: Vec<AverageEntry> = result
            .runs
            .iter()
            .zip(&result.cache)
            .map(|((name, average), cache)| AverageEntry::new(name.clone(), average, Some(cache)))
            .collect();
        let combined = if combine {
            Some(AverageEntry::new("combined", &result.combined()?, None))
        } else {
            None
        };
        let report_hash = stable_hash_string(&HashedFields {
            query,
            runs: runs.iter().map(AverageEntry::hashed).collect(),
            combined: combined.as_ref().map(AverageEntry::hashed),
        })?;
        Ok(Self {
            quantity: query.quantity.clone(),
            rules: query.rules.clone(),
            source_split: query.splits.source,
            modulator_split: query.splits.modulator,
            slice: query.slice.to_string(),
            bucket_shape: query.bucket_shape(),
            runs,
            combined,
            report_hash,
        })
    }
}
