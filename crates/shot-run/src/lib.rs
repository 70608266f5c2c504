#![deny(missing_docs)]
#![doc = "Shot classification, file compilation, caching and run/run-set aggregation."]

/// Content-addressed cache of aggregation results.
pub mod cache;
/// Canonical JSON encoding and hashing.
pub mod canonical;
/// Periodic source/modulator classification.
pub mod classify;
/// File-level compilation into buckets.
pub mod compile;
/// YAML configuration and per-call options.
pub mod config;
/// Parallel per-file dispatch.
pub mod dispatch;
/// Serializable aggregation reports.
pub mod report;
/// Runs over ordered file lists.
pub mod run;
/// Ordered collections of runs.
pub mod runset;
/// Slices over a quantity's trailing axes.
pub mod slice;

pub use cache::{cache_key, plan_blocks, work_dir_for, Block, CacheInfo, CacheManager, CacheRecord};
pub use canonical::{stable_hash_string, to_canonical_json_bytes, to_canonical_json_pretty};
pub use classify::{classify, detect_modulator_offset, Condition, ShotFlags, Splits, CONDITIONS};
pub use compile::{
    compile_file, compile_loaded, BucketSums, FileBuckets, Query, WarnOnce, WorkerConfig,
};
pub use config::{
    load_run_config, load_run_set_config, AverageOpts, ClassifierConfig, RunConfig, RunSetConfig,
};
pub use dispatch::{compile_files, dispatch, FileJob};
pub use report::{AverageEntry, AverageReport};
pub use run::{CollectedBuckets, MomentQuery, Run, RunAverage, RunCollection};
pub use runset::{RunSet, RunSetAverage};
pub use slice::{AxisSlice, SliceSpec};
