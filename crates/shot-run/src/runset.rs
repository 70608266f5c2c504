//! Ordered collections of shared runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_stats::{StackedAverage, WeightedAverage};

use crate::cache::CacheInfo;
use crate::compile::Query;
use crate::config::{AverageOpts, RunSetConfig};
use crate::run::{Run, RunCollection};

/// Per-run averages of a run set, in run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSetAverage {
    /// Run name and its weighted average.
    pub runs: Vec<(String, WeightedAverage)>,
    /// Cache activity of each run, aligned with `runs`.
    pub cache: Vec<CacheInfo>,
}

impl RunSetAverage {
    /// Stacks the run averages along a new leading run axis.
    pub fn stacked(&self) -> Result<StackedAverage, ShotError> {
        let parts: Vec<WeightedAverage> =
            self.runs.iter().map(|(_, average)| average.clone()).collect();
        WeightedAverage::stack(&parts)
    }

    /// Folds the run averages with the weighted-average combination rule.
    pub fn combined(&self) -> Result<WeightedAverage, ShotError> {
        WeightedAverage::fold(self.runs.iter().map(|(_, average)| average))?.ok_or_else(|| {
            ShotError::Compile(ErrorInfo::new("empty_run_set", "run set holds no runs"))
        })
    }
}

/// Ordered set of runs; holds shared references and no data of its own.
#[derive(Debug, Clone, Default)]
pub struct RunSet {
    runs: Vec<Arc<Run>>,
}

impl RunSet {
    /// Empty run set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every run of a configuration, applying the shared aliases
    /// beneath each run's own.
    pub fn from_config(config: &RunSetConfig) -> Result<Self, ShotError> {
        let mut set = Self::new();
        for run_config in &config.runs {
            let mut run_config = run_config.clone();
            run_config.aliases = run_config.aliases.merged_with(&config.aliases);
            set.add(Arc::new(Run::from_config(&run_config)?));
        }
        Ok(set)
    }

    /// Appends a run; returns `false` when this very run is already a member.
    pub fn add(&mut self, run: Arc<Run>) -> bool {
        if self.runs.iter().any(|member| Arc::ptr_eq(member, &run)) {
            log::debug!("run '{}' already in set", run.name());
            return false;
        }
        self.runs.push(run);
        true
    }

    /// Removes a run by identity; returns whether it was a member.
    pub fn remove(&mut self, run: &Arc<Run>) -> bool {
        let before = self.runs.len();
        self.runs.retain(|member| !Arc::ptr_eq(member, run));
        self.runs.len() != before
    }

    /// Member runs in order.
    pub fn runs(&self) -> &[Arc<Run>] {
        &self.runs
    }

    /// Number of runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True when the set holds no run.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Averages every run in order.
    pub fn average(&self, query: &Query, opts: &AverageOpts) -> Result<RunSetAverage, ShotError> {
        let mut runs = Vec::with_capacity(self.runs.len());
        let mut cache = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let result = run.average(query, opts)?;
            runs.push((run.name().to_string(), result.average));
            cache.push(result.cache);
        }
        Ok(RunSetAverage { runs, cache })
    }

    /// Collects raw bucket rows of every run in order.
    pub fn collect(
        &self,
        query: &Query,
        opts: &AverageOpts,
    ) -> Result<Vec<(String, RunCollection)>, ShotError> {
        self.runs
            .iter()
            .map(|run| Ok((run.name().to_string(), run.collect(query, opts)?)))
            .collect()
    }
}
