use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::NdArray;
use shot_rule::compile_rules;
use shot_stats::{MomentSums, SampleFilter, WeightedAverage};
use shot_store::{AliasMap, DirStore, ShotStore};

use crate::cache::{
    cache_key, plan_blocks, work_dir_for, CacheInfo, CacheManager, AVERAGE_OPERATION,
    COLLECT_OPERATION,
};
use crate::classify::{detect_modulator_offset, Splits};
use crate::compile::{compile_file, BucketSums, Query, WarnOnce, WorkerConfig};
use crate::config::{AverageOpts, ClassifierConfig, RunConfig};
use crate::dispatch::{compile_files, dispatch, FileJob};

/// Weighted average of a run together with the cache activity of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAverage {
    /// Per-bucket averages and weights.
    pub average: WeightedAverage,
    /// Artifacts saved and loaded.
    pub cache: CacheInfo,
}

/// Raw selected rows of a run, concatenated across files per bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedBuckets {
    /// `[4, rules]`.
    pub bucket_shape: Vec<usize>,
    /// Rows per bucket in condition-major order.
    pub rows: Vec<NdArray>,
}

/// Collected rows together with the cache activity of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCollection {
    /// Rows per bucket.
    pub buckets: CollectedBuckets,
    /// Artifacts saved and loaded.
    pub cache: CacheInfo,
}

/// Second stream and filters of a co-moment query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentQuery {
    /// Keyword of the second quantity; the first quantity against itself when absent.
    pub second: Option<String>,
    /// Filter of the first stream.
    pub filter_1: Option<SampleFilter>,
    /// Filter of the second stream.
    pub filter_2: Option<SampleFilter>,
}

/// Ordered, growable list of shot files sharing one classifier and alias map.
///
/// The auto-detected modulator offset is memoized here and only cleared by
/// [`Run::reset_modulator_offset`].
#[derive(Debug)]
pub struct Run {
    name: String,
    store: Arc<dyn ShotStore>,
    files: Vec<String>,
    aliases: AliasMap,
    classifier: ClassifierConfig,
    shot_index_dataset: String,
    source_period_dataset: String,
    cache: Option<CacheManager>,
    detected_offset: OnceLock<i64>,
    warnings: WarnOnce,
}

fn no_data_error(quantity: &str, files: &[String]) -> ShotError {
    ShotError::Compile(
        ErrorInfo::new("no_data", "no file holds the requested quantity")
            .with_context("quantity", quantity)
            .with_context("files", files.join(", ")),
    )
}

impl Run {
    /// Run over every file currently listed by `store`.
    pub fn new(name: impl Into<String>, store: Arc<dyn ShotStore>) -> Result<Self, ShotError> {
        let files = store.list()?;
        Ok(Self::with_files(name, store, files))
    }

    /// Run over an explicit file list.
    pub fn with_files(
        name: impl Into<String>,
        store: Arc<dyn ShotStore>,
        files: Vec<String>,
    ) -> Self {
        let cache = store.location().map(work_dir_for).map(CacheManager::new);
        Self {
            name: name.into(),
            store,
            files,
            aliases: AliasMap::default(),
            classifier: ClassifierConfig::default(),
            shot_index_dataset: "bunches".to_string(),
            source_period_dataset: "Background_Period".to_string(),
            cache,
            detected_offset: OnceLock::new(),
            warnings: WarnOnce::default(),
        }
    }

    /// Builds a run from its YAML configuration, reading files from `data_dir`.
    pub fn from_config(config: &RunConfig) -> Result<Self, ShotError> {
        let store: Arc<dyn ShotStore> = Arc::new(DirStore::open(&config.data_dir)?);
        let files = match &config.files {
            Some(files) => files.clone(),
            None => store.list()?,
        };
        log::info!(
            "run '{}' over {} files in {}",
            config.name,
            files.len(),
            config.data_dir.display()
        );
        let mut run = Self::with_files(config.name.clone(), store, files)
            .with_aliases(config.aliases.clone())
            .with_classifier(config.classifier.clone());
        run.shot_index_dataset = config.shot_index_dataset.clone();
        run.source_period_dataset = config.source_period_dataset.clone();
        Ok(run)
    }

    /// Sets the alias map.
    pub fn with_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// Sets the classifier parameters and forgets any detected offset.
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self.detected_offset = OnceLock::new();
        self
    }

    /// Overrides the shot index and source period dataset names.
    pub fn with_datasets(
        mut self,
        shot_index: impl Into<String>,
        source_period: impl Into<String>,
    ) -> Self {
        self.shot_index_dataset = shot_index.into();
        self.source_period_dataset = source_period.into();
        self
    }

    /// Caches below `work_dir` instead of the derived location.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(CacheManager::new(work_dir));
        self
    }

    /// Disables caching for this run.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Run name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Files in run order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Alias map.
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn ShotStore> {
        &self.store
    }

    /// Work directory of the cache, if caching is possible.
    pub fn work_dir(&self) -> Option<&Path> {
        self.cache.as_ref().map(CacheManager::root)
    }

    /// Appends files, skipping ones already in the run.
    pub fn add_files<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for file in files {
            let file = file.into();
            if self.files.contains(&file) {
                log::warn!("run '{}' already holds {file}", self.name);
            } else {
                self.files.push(file);
            }
        }
    }

    /// Forgets the auto-detected modulator offset.
    pub fn reset_modulator_offset(&mut self) {
        self.detected_offset = OnceLock::new();
    }

    /// Configured modulator offset, or the one detected from the reference signal.
    pub fn modulator_offset(&self) -> Result<i64, ShotError> {
        if let Some(offset) = self.classifier.modulator_offset {
            return Ok(offset);
        }
        if let Some(offset) = self.detected_offset.get() {
            return Ok(*offset);
        }
        let offset = self.detect_modulator_offset()?;
        Ok(*self.detected_offset.get_or_init(|| offset))
    }

    fn detect_modulator_offset(&self) -> Result<i64, ShotError> {
        let reference = &self.classifier.modulator_reference;
        let path = self.aliases.resolve(reference);
        for name in &self.files {
            let file = self.store.load(name)?;
            let Some(signal) = file.numeric(path) else {
                continue;
            };
            let shots = file.shot_indices(&self.shot_index_dataset)?;
            if signal.ndim() == 0 || signal.rows() != shots.len() {
                continue;
            }
            let width = signal.row_len().max(1) as f64;
            let values: Vec<f64> = signal
                .iter_rows()
                .map(|row| row.iter().sum::<f64>() / width)
                .collect();
            let offset =
                detect_modulator_offset(&shots, &values, self.classifier.modulator_period)?;
            log::info!(
                "run '{}': modulator offset {offset} detected from '{reference}' in {name}",
                self.name
            );
            return Ok(offset);
        }
        Err(ShotError::Classify(
            ErrorInfo::new(
                "modulator_reference_missing",
                "no file carries a per-shot modulator reference",
            )
            .with_context("run", self.name.clone())
            .with_context("reference", reference.clone()),
        ))
    }

    /// Snapshot handed to workers; the modulator offset is resolved only when
    /// the modulator split needs it.
    pub fn worker_config(&self, splits: Splits) -> Result<WorkerConfig, ShotError> {
        let modulator_offset = if splits.modulator && self.classifier.modulator_period > 0 {
            self.modulator_offset()?
        } else {
            self.classifier.modulator_offset.unwrap_or(0)
        };
        Ok(WorkerConfig {
            aliases: self.aliases.clone(),
            shot_index_dataset: self.shot_index_dataset.clone(),
            source_period_dataset: self.source_period_dataset.clone(),
            source_period: self.classifier.source_period,
            source_offset: self.classifier.source_offset,
            modulator_period: self.classifier.modulator_period,
            modulator_offset,
            warnings: self.warnings.clone(),
        })
    }

    fn key_for(
        &self,
        operation: &str,
        files: &[String],
        query: &Query,
    ) -> Result<String, ShotError> {
        cache_key(operation, self.store.location(), files, query)
    }

    fn jobs<'a, I>(&self, files: I, config: &WorkerConfig) -> Vec<FileJob>
    where
        I: IntoIterator<Item = &'a String>,
    {
        files
            .into_iter()
            .map(|file| FileJob {
                file: file.clone(),
                config: config.clone(),
            })
            .collect()
    }

    /// Per-file bucket sums, in file order; `None` where the quantity is missing.
    pub fn file_sums(
        &self,
        query: &Query,
        workers: usize,
    ) -> Result<Vec<(String, Option<BucketSums>)>, ShotError> {
        let rules = compile_rules(&query.rules)?;
        let config = self.worker_config(query.splits)?;
        let store = self.store.as_ref();
        dispatch(self.jobs(&self.files, &config), workers, |job| {
            let sums = compile_file(store, &job.file, query, &rules, &job.config)?
                .map(|buckets| buckets.sums())
                .transpose()?;
            Ok((job.file, sums))
        })
    }

    /// Per-file weighted averages, in file order.
    pub fn file_averages(
        &self,
        query: &Query,
        workers: usize,
    ) -> Result<Vec<(String, Option<WeightedAverage>)>, ShotError> {
        self.file_sums(query, workers)?
            .into_iter()
            .map(|(file, sums)| Ok((file, sums.map(|sums| sums.average()).transpose()?)))
            .collect()
    }

    /// Weighted average per bucket over the whole run.
    ///
    /// Checks the whole-run cache, then each block's cache, compiles the files
    /// of every missing block in parallel, folds them block by block and saves
    /// what `opts` asks for.
    pub fn average(&self, query: &Query, opts: &AverageOpts) -> Result<RunAverage, ShotError> {
        if self.files.is_empty() {
            return Err(no_data_error(&query.quantity, &self.files));
        }
        let rules = compile_rules(&query.rules)?;
        let mut info = CacheInfo::default();
        let cache = self.cache.as_ref();
        let total_key = self.key_for(AVERAGE_OPERATION, &self.files, query)?;

        if opts.use_cache {
            if let Some(cache) = cache {
                if let Some(artifact) = cache.load::<WeightedAverage>(AVERAGE_OPERATION, &total_key) {
                    info.record_loaded(cache.path(AVERAGE_OPERATION, &total_key), &self.files);
                    return Ok(RunAverage {
                        average: artifact.value,
                        cache: info,
                    });
                }
            }
        }

        let blocks = plan_blocks(&self.files, opts.block_size)?;
        let mut keys = Vec::with_capacity(blocks.len());
        let mut results: Vec<Option<Option<WeightedAverage>>> = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let key = match opts.block_size {
                Some(_) => self.key_for(AVERAGE_OPERATION, &block.files, query)?,
                None => total_key.clone(),
            };
            let mut loaded = None;
            if opts.use_cache && opts.block_size.is_some() {
                if let Some(cache) = cache {
                    if let Some(artifact) = cache.load::<WeightedAverage>(AVERAGE_OPERATION, &key) {
                        info.record_loaded(cache.path(AVERAGE_OPERATION, &key), &block.files);
                        loaded = Some(Some(artifact.value));
                    }
                }
            }
            keys.push(key);
            results.push(loaded);
        }

        let config = self.worker_config(query.splits)?;
        let pending = blocks
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_none())
            .flat_map(|(block, _)| block.files.iter());
        let jobs = self.jobs(pending, &config);
        let store = self.store.as_ref();
        let per_file = dispatch(jobs, opts.workers, |job| {
            compile_file(store, &job.file, query, &rules, &job.config)?
                .map(|buckets| buckets.sums()?.average())
                .transpose()
        })?;

        let mut per_file = per_file.into_iter();
        for ((block, key), result) in blocks.iter().zip(&keys).zip(results.iter_mut()) {
            if result.is_some() {
                continue;
            }
            let file_results: Vec<WeightedAverage> = per_file
                .by_ref()
                .take(block.files.len())
                .flatten()
                .collect();
            let block_average = WeightedAverage::fold(&file_results)?;
            let wants_block = opts.block_size.is_some() && (block.complete || opts.save_incomplete);
            if let (Some(cache), Some(average)) = (cache, block_average.as_ref()) {
                if opts.make_cache && wants_block {
                    let path = cache.save(AVERAGE_OPERATION, key, &block.files, average)?;
                    info.record_saved(path, &block.files);
                }
            }
            *result = Some(block_average);
        }

        let total = WeightedAverage::fold(results.iter().flatten().flatten())?
            .ok_or_else(|| no_data_error(&query.quantity, &self.files))?;
        let wants_total = opts.block_size.is_none() || blocks.len() > 1;
        if let Some(cache) = cache {
            if opts.make_cache && opts.save_total && wants_total {
                let path = cache.save(AVERAGE_OPERATION, &total_key, &self.files, &total)?;
                info.record_saved(path, &self.files);
            }
        }
        log::info!(
            "run '{}': averaged '{}' over {} files ({} artifacts loaded, {} saved)",
            self.name,
            query.quantity,
            self.files.len(),
            info.loaded.len(),
            info.saved.len()
        );
        Ok(RunAverage {
            average: total,
            cache: info,
        })
    }

    /// Raw selected rows per bucket, concatenated across files in run order.
    pub fn collect(&self, query: &Query, opts: &AverageOpts) -> Result<RunCollection, ShotError> {
        let rules = compile_rules(&query.rules)?;
        let mut info = CacheInfo::default();
        let cache = self.cache.as_ref();
        let key = self.key_for(COLLECT_OPERATION, &self.files, query)?;
        if opts.use_cache {
            if let Some(cache) = cache {
                if let Some(artifact) = cache.load::<CollectedBuckets>(COLLECT_OPERATION, &key) {
                    info.record_loaded(cache.path(COLLECT_OPERATION, &key), &self.files);
                    return Ok(RunCollection {
                        buckets: artifact.value,
                        cache: info,
                    });
                }
            }
        }

        let config = self.worker_config(query.splits)?;
        let compiled = compile_files(
            self.store.as_ref(),
            self.jobs(&self.files, &config),
            query,
            &rules,
            opts.workers,
        )?;
        let present: Vec<_> = compiled.into_iter().filter_map(|(_, buckets)| buckets).collect();
        if present.is_empty() {
            return Err(no_data_error(&query.quantity, &self.files));
        }
        let bucket_count = present[0].rows.len();
        let rows = (0..bucket_count)
            .map(|bucket| {
                let parts: Vec<NdArray> = present.iter().map(|file| file.rows[bucket].clone()).collect();
                NdArray::concat_rows(&parts)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let buckets = CollectedBuckets {
            bucket_shape: query.bucket_shape(),
            rows,
        };
        if let Some(cache) = cache {
            if opts.make_cache && opts.save_total {
                let path = cache.save(COLLECT_OPERATION, &key, &self.files, &buckets)?;
                info.record_saved(path, &self.files);
            }
        }
        Ok(RunCollection {
            buckets,
            cache: info,
        })
    }

    /// Co-moment sums per bucket, merged across files with Chan's rule.
    pub fn moment_sums(
        &self,
        query: &Query,
        moments: &MomentQuery,
        workers: usize,
    ) -> Result<Vec<MomentSums>, ShotError> {
        let rules = compile_rules(&query.rules)?;
        let config = self.worker_config(query.splits)?;
        let second_query = moments.second.as_ref().map(|second| Query {
            quantity: second.clone(),
            ..query.clone()
        });
        let store = self.store.as_ref();
        let per_file = dispatch(self.jobs(&self.files, &config), workers, |job| {
            let Some(first) = compile_file(store, &job.file, query, &rules, &job.config)? else {
                return Ok(None);
            };
            let second = match &second_query {
                Some(second_query) => {
                    match compile_file(store, &job.file, second_query, &rules, &job.config)? {
                        Some(second) => Some(second),
                        None => return Ok(None),
                    }
                }
                None => None,
            };
            first
                .moment_sums(
                    second.as_ref(),
                    moments.filter_1.as_ref(),
                    moments.filter_2.as_ref(),
                )
                .map(Some)
        })?;

        let mut merged: Option<Vec<MomentSums>> = None;
        for sums in per_file.into_iter().flatten() {
            merged = Some(match merged {
                None => sums,
                Some(current) => current
                    .iter()
                    .zip(&sums)
                    .map(|(a, b)| a.merge(b))
                    .collect::<Result<Vec<_>, _>>()?,
            });
        }
        merged.ok_or_else(|| no_data_error(&query.quantity, &self.files))
    }
}
