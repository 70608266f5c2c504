use rayon::prelude::*;
use shot_core::errors::{ErrorInfo, ShotError};
use shot_rule::CompiledPredicate;
use shot_store::ShotStore;

use crate::compile::{compile_file, FileBuckets, Query, WorkerConfig};

fn pool_error(err: impl ToString) -> ShotError {
    ShotError::Compile(ErrorInfo::new("thread_pool", err.to_string()))
}

/// One unit of work: a file and the worker's own configuration snapshot.
#[derive(Debug, Clone)]
pub struct FileJob {
    /// File identifier.
    pub file: String,
    /// Configuration handed to the worker by value.
    pub config: WorkerConfig,
}

/// Runs `task` over `jobs` on a pool of `workers` threads.
///
/// Results come back in job order; the first error aborts the batch.
pub fn dispatch<T, F>(jobs: Vec<FileJob>, workers: usize, task: F) -> Result<Vec<T>, ShotError>
where
    T: Send,
    F: Fn(FileJob) -> Result<T, ShotError> + Sync + Send,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(pool_error)?;
    let results: Result<Vec<(usize, T)>, ShotError> = pool.install(|| {
        jobs.into_par_iter()
            .enumerate()
            .map(|(index, job)| -> Result<(usize, T), ShotError> { Ok((index, task(job)?)) })
            .collect()
    });
    let mut ordered = results?;
    ordered.sort_by_key(|(index, _)| *index);
    Ok(ordered.into_iter().map(|(_, result)| result).collect())
}

/// Compiles every job's file in parallel.
pub fn compile_files(
    store: &dyn ShotStore,
    jobs: Vec<FileJob>,
    query: &Query,
    rules: &[CompiledPredicate],
    workers: usize,
) -> Result<Vec<(String, Option<FileBuckets>)>, ShotError> {
    log::debug!(
        "compiling {} files for '{}' on {} workers",
        jobs.len(),
        query.quantity,
        workers.max(1)
    );
    dispatch(jobs, workers, |job| {
        let buckets = compile_file(store, &job.file, query, rules, &job.config)?;
        Ok((job.file, buckets))
    })
}
