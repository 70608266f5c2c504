//! File-level compilation: classify shots, evaluate rules and bucket the rows.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::NdArray;
use shot_rule::CompiledPredicate;
use shot_stats::{accumulate, MomentSums, SampleFilter, WeightedAverage};
use shot_store::{AliasMap, Dataset, FileAccessor, ShotFile, ShotStore};

use crate::classify::{classify, Splits, CONDITIONS};
use crate::slice::SliceSpec;

/// Immutable snapshot of everything a worker needs to compile one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Keyword aliases.
    pub aliases: AliasMap,
    /// Dataset holding the shot indices.
    pub shot_index_dataset: String,
    /// Dataset holding the per-file source period.
    pub source_period_dataset: String,
    /// Source period override.
    pub source_period: Option<i64>,
    /// Phase at which the source is off.
    pub source_offset: i64,
    /// Modulator period.
    pub modulator_period: i64,
    /// Resolved modulator offset.
    pub modulator_offset: i64,
    /// Per-file warnings already logged by the owner of this snapshot.
    #[serde(skip)]
    pub warnings: WarnOnce,
}

/// Shared record of the `(file, subject)` warnings already logged.
///
/// Clones share one record. Equality ignores it, so two snapshots with the
/// same parameters compare equal.
#[derive(Debug, Clone, Default)]
pub struct WarnOnce {
    seen: Arc<Mutex<HashSet<(String, String)>>>,
}

impl WarnOnce {
    /// True the first time `(file, subject)` is recorded.
    pub fn first(&self, file: &str, subject: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((file.to_string(), subject.to_string()))
    }
}

impl PartialEq for WarnOnce {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for WarnOnce {}

/// What to aggregate: a quantity, its slices, the rules and the splits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Keyword of the aggregated quantity.
    pub quantity: String,
    /// Selection rules; `None` selects every shot.
    pub rules: Vec<Option<String>>,
    /// Active condition splits.
    pub splits: Splits,
    /// Slices over the quantity's trailing axes.
    pub slice: SliceSpec,
}

impl Query {
    /// Query over every shot of `quantity`, without splits.
    pub fn new(quantity: impl Into<String>) -> Self {
        Self {
            quantity: quantity.into(),
            rules: vec![None],
            splits: Splits::default(),
            slice: SliceSpec::none(),
        }
    }

    /// Replaces the rule list; an empty list means a single select-all rule.
    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.rules = rules.into_iter().map(|rule| rule.map(Into::into)).collect();
        if self.rules.is_empty() {
            self.rules.push(None);
        }
        self
    }

    /// Sets the condition splits.
    pub fn with_splits(mut self, splits: Splits) -> Self {
        self.splits = splits;
        self
    }

    /// Sets the trailing-axis slices.
    pub fn with_slice(mut self, slice: SliceSpec) -> Self {
        self.slice = slice;
        self
    }

    /// Leading bucket axes `[4, rules]`.
    pub fn bucket_shape(&self) -> Vec<usize> {
        vec![CONDITIONS, self.rules.len()]
    }
}

/// Selected rows of one file, one array per bucket in condition-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBuckets {
    /// File identifier.
    pub file: String,
    /// `[4, rules]`.
    pub bucket_shape: Vec<usize>,
    /// Rows per bucket, each shaped `[selected, ...data_shape]`.
    pub rows: Vec<NdArray>,
}

/// Per-bucket sums and counts of one file (or a fold of files).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSums {
    /// File identifier.
    pub file: String,
    /// `[4, rules]`.
    pub bucket_shape: Vec<usize>,
    /// Sums shaped `[4, rules, ...data_shape]`.
    pub sums: NdArray,
    /// One count per bucket.
    pub counts: Vec<f64>,
}

impl FileBuckets {
    /// Rows of the bucket at `(condition, rule)`.
    pub fn bucket(&self, condition: usize, rule: usize) -> &NdArray {
        &self.rows[condition * self.bucket_shape[1] + rule]
    }

    /// Shape of one selected row.
    pub fn data_shape(&self) -> &[usize] {
        self.rows
            .first()
            .map(|rows| rows.inner_shape())
            .unwrap_or(&[])
    }

    /// Sums every bucket; empty buckets sum to zeros of the data shape.
    pub fn sums(&self) -> Result<BucketSums, ShotError> {
        let totals: Vec<NdArray> = self.rows.iter().map(NdArray::sum_rows).collect();
        let counts = self.rows.iter().map(|rows| rows.rows() as f64).collect();
        let mut shape = self.bucket_shape.clone();
        shape.extend_from_slice(self.data_shape());
        let sums = NdArray::stack(&totals)?.reshape(shape)?;
        Ok(BucketSums {
            file: self.file.clone(),
            bucket_shape: self.bucket_shape.clone(),
            sums,
            counts,
        })
    }

    /// Co-moment sums per bucket of this quantity against `second` (or itself).
    pub fn moment_sums(
        &self,
        second: Option<&FileBuckets>,
        filter_1: Option<&SampleFilter>,
        filter_2: Option<&SampleFilter>,
    ) -> Result<Vec<MomentSums>, ShotError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(bucket, rows)| {
                let other = second.map(|second| &second.rows[bucket]);
                accumulate(
                    &flatten_rows(rows)?,
                    other.map(flatten_rows).transpose()?.as_ref(),
                    filter_1,
                    filter_2,
                    1.0,
                )
            })
            .collect()
    }
}

fn flatten_rows(rows: &NdArray) -> Result<NdArray, ShotError> {
    rows.reshape(vec![rows.rows(), rows.row_len()])
}

impl BucketSums {
    /// Per-bucket average and weight of these sums.
    pub fn average(&self) -> Result<WeightedAverage, ShotError> {
        WeightedAverage::from_sums(self.bucket_shape.clone(), self.sums.clone(), &self.counts)
    }
}

fn compile_error(code: &str, message: &str, file: &str, quantity: &str) -> ShotError {
    ShotError::Compile(
        ErrorInfo::new(code, message)
            .with_context("file", file)
            .with_context("quantity", quantity),
    )
}

/// Quantity in `(shot, ...)` layout and whether axis 0 really indexes shots.
fn canonical_layout(array: &NdArray, shots: usize) -> Result<(NdArray, bool), ShotError> {
    match array.ndim() {
        0 => Ok((array.reshape(vec![1, 1])?, false)),
        1 if array.len() == shots => Ok((array.reshape(vec![shots, 1])?, true)),
        1 => Ok((array.reshape(vec![1, array.len()])?, false)),
        _ if array.rows() == shots => Ok((array.clone(), true)),
        _ => {
            let mut shape = array.shape().to_vec();
            shape.insert(0, 1);
            Ok((array.reshape(shape)?, false))
        }
    }
}

fn source_period(file: &ShotFile, name: &str, config: &WorkerConfig) -> i64 {
    if let Some(period) = config.source_period {
        return period;
    }
    let dataset = &config.source_period_dataset;
    match file.numeric(dataset).and_then(|array| array.data().first().copied()) {
        Some(value) => value.round() as i64,
        None => {
            if config.warnings.first(name, &format!("source_period:{dataset}")) {
                log::warn!("source period dataset '{dataset}' missing in {name}; period unknown");
            }
            -1
        }
    }
}

/// Compiles one file into bucketed rows.
///
/// Returns `Ok(None)` (after a warning) when the file lacks the quantity.
pub fn compile_file(
    store: &dyn ShotStore,
    name: &str,
    query: &Query,
    rules: &[CompiledPredicate],
    config: &WorkerConfig,
) -> Result<Option<FileBuckets>, ShotError> {
    let file = store.load(name)?;
    compile_loaded(&file, name, query, rules, config).map_err(|err| err.with_context("file", name))
}

/// [`compile_file`] over an already loaded file.
pub fn compile_loaded(
    file: &ShotFile,
    name: &str,
    query: &Query,
    rules: &[CompiledPredicate],
    config: &WorkerConfig,
) -> Result<Option<FileBuckets>, ShotError> {
    if rules.len() != query.rules.len() {
        return Err(ShotError::Compile(
            ErrorInfo::new("rule_count", "compiled rules do not match the query's rules")
                .with_context("file", name)
                .with_context("query_rules", query.rules.len().to_string())
                .with_context("compiled_rules", rules.len().to_string()),
        ));
    }
    let shots = file
        .shot_indices(&config.shot_index_dataset)
        .map_err(|err| err.with_context("file", name))?;
    let path = config.aliases.resolve(&query.quantity);
    let array = match file.dataset(path) {
        None => {
            log::warn!("quantity '{}' ({path}) missing in {name}; skipping file", query.quantity);
            return Ok(None);
        }
        Some(Dataset::Text { .. }) => {
            return Err(compile_error(
                "quantity_not_numeric",
                "aggregated quantity must be numeric",
                name,
                &query.quantity,
            ))
        }
        Some(Dataset::Numeric(array)) => array,
    };

    let (layout, per_shot) = canonical_layout(array, shots.len())?;
    let data = query.slice.apply(&layout).map_err(|err| {
        err.with_context("file", name)
            .with_context("quantity", query.quantity.clone())
    })?;

    let (condition_masks, rule_masks) = if per_shot {
        let flags = classify(
            &shots,
            source_period(file, name, config),
            config.source_offset,
            config.modulator_period,
            config.modulator_offset,
        );
        let accessor = FileAccessor::new(file, &config.aliases, shots.len());
        let rule_masks = rules
            .iter()
            .map(|rule| rule.mask(&accessor, shots.len()))
            .collect::<Result<Vec<_>, _>>()?;
        (flags.condition_masks(query.splits), rule_masks)
    } else {
        if query.splits.any()
            && config
                .warnings
                .first(name, &format!("split:{}", query.quantity))
        {
            log::warn!(
                "quantity '{}' in {name} is not per-shot (shape {:?}, {} shots); condition splitting disabled",
                query.quantity,
                array.shape(),
                shots.len()
            );
        }
        (
            [vec![true], vec![false], vec![false], vec![false]],
            vec![vec![true]; rules.len()],
        )
    };

    let mut rows = Vec::with_capacity(CONDITIONS * rules.len());
    for condition in &condition_masks {
        for rule in &rule_masks {
            let mask: Vec<bool> = condition.iter().zip(rule).map(|(c, r)| *c && *r).collect();
            rows.push(data.select_rows(&mask)?);
        }
    }
    Ok(Some(FileBuckets {
        file: name.to_string(),
        bucket_shape: query.bucket_shape(),
        rows,
    }))
}
