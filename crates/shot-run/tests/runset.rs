mod common;

use std::fs;
use std::sync::Arc;

use shot_run::{
    load_run_set_config, AverageOpts, AverageReport, MomentQuery, Query, Run, RunSet, Splits,
};
use shot_store::{DirStore, SynthSpec};

use common::{assert_close, classifier_for, dir_run, memory_run, synth_dir};

fn single_file_run(spec: &SynthSpec, index: usize) -> Run {
    Run::with_files(
        format!("run_{index}"),
        Arc::new(spec.memory_store().unwrap()),
        vec![SynthSpec::file_name(index)],
    )
    .with_aliases(SynthSpec::aliases())
    .with_classifier(classifier_for(spec))
}

#[test]
fn combined_run_set_matches_one_run_over_all_files() {
    let spec = SynthSpec::default();
    let query = Query::new("signal")
        .with_rules([None, Some("i0m>10")])
        .with_splits(Splits::both());
    let opts = AverageOpts::uncached();

    let mut set = RunSet::new();
    assert!(set.add(Arc::new(single_file_run(&spec, 0))));
    assert!(set.add(Arc::new(single_file_run(&spec, 1))));
    let result = set.average(&query, &opts).unwrap();
    assert_eq!(result.runs.len(), 2);
    assert_eq!(result.cache.len(), 2);

    let whole = memory_run(&spec).average(&query, &opts).unwrap().average;
    let combined = result.combined().unwrap();
    assert_eq!(combined.weights, whole.weights);
    assert_close(combined.average.data(), whole.average.data(), 1e-12);

    let stacked = result.stacked().unwrap();
    assert_eq!(stacked.average.shape(), &[2, 4, 2, 1]);
    assert_eq!(stacked.weights.shape(), &[2, 4, 2]);

    let report = AverageReport::build(&query, &result, true).unwrap();
    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.combined.as_ref().unwrap().weights, whole.weights.data());
    assert_eq!(report.report_hash.len(), 64);
}

#[test]
fn report_hash_is_the_same_for_cold_and_warm_caches() {
    let spec = SynthSpec::default();
    let (_tmp, data) = synth_dir(&spec);
    let mut set = RunSet::new();
    assert!(set.add(Arc::new(dir_run(&spec, &data))));
    let query = Query::new("signal").with_splits(Splits::both());

    let cold = set.average(&query, &AverageOpts::default()).unwrap();
    let warm = set.average(&query, &AverageOpts::default()).unwrap();
    assert!(cold.cache[0].loaded.is_empty());
    assert_eq!(warm.cache[0].loaded.len(), 1);

    let cold = AverageReport::build(&query, &cold, true).unwrap();
    let warm = AverageReport::build(&query, &warm, true).unwrap();
    assert_eq!(cold.runs[0].cache_saved, 1);
    assert_eq!(warm.runs[0].cache_loaded, 1);
    assert_eq!(cold.report_hash, warm.report_hash);
}

#[test]
fn duplicate_runs_are_ignored_by_identity() {
    let spec = SynthSpec::default();
    let run = Arc::new(memory_run(&spec));
    let mut set = RunSet::new();
    assert!(set.add(run.clone()));
    assert!(!set.add(run.clone()));
    assert!(set.add(Arc::new(memory_run(&spec))));
    assert_eq!(set.len(), 2);
    assert!(set.remove(&run));
    assert!(!set.remove(&run));
    assert_eq!(set.len(), 1);
}

#[test]
fn moment_sums_agree_with_the_average() {
    let spec = SynthSpec::default();
    let run = memory_run(&spec);
    let query = Query::new("signal").with_splits(Splits::both());
    let average = run.average(&query, &AverageOpts::uncached()).unwrap().average;
    let moments = run
        .moment_sums(
            &query,
            &MomentQuery {
                second: Some("i0m".to_string()),
                ..MomentQuery::default()
            },
            2,
        )
        .unwrap();
    assert_eq!(moments.len(), 4);
    for (bucket, sums) in moments.iter().enumerate() {
        assert_eq!(sums.count, average.weights.data()[bucket]);
        if sums.count > 0.0 {
            assert_close(&[sums.mean_1()[0]], &[average.average.data()[bucket]], 1e-9);
        }
    }
}

#[test]
fn collect_concatenates_bucket_rows_in_file_order() {
    let spec = SynthSpec::default();
    let (_tmp, data) = synth_dir(&spec);
    let run = Run::new("run_a", Arc::new(DirStore::open(&data).unwrap()))
        .unwrap()
        .with_aliases(SynthSpec::aliases())
        .with_classifier(classifier_for(&spec));
    let query = Query::new("tof").with_splits(Splits::both());
    let collected = run.collect(&query, &AverageOpts::default()).unwrap();
    let weights = run
        .average(&query, &AverageOpts::uncached())
        .unwrap()
        .average
        .weights;
    for (bucket, rows) in collected.buckets.rows.iter().enumerate() {
        assert_eq!(rows.rows() as f64, weights.data()[bucket]);
        assert_eq!(rows.inner_shape(), &[spec.trace_len]);
    }
    assert_eq!(collected.cache.saved.len(), 1);

    let again = run.collect(&query, &AverageOpts::default()).unwrap();
    assert_eq!(again.cache.loaded.len(), 1);
    assert_eq!(again.buckets, collected.buckets);
}

#[test]
fn run_sets_load_from_yaml_with_shared_aliases() {
    let spec = SynthSpec::default();
    let (tmp, data) = synth_dir(&spec);
    let yaml = format!(
        "runs:\n  - name: first\n    data_dir: {dir}\n    files: [run_000.shot]\n  - name: second\n    data_dir: {dir}\n    aliases:\n      signal: photon/i0/monitor\naliases:\n  signal: detector/signal\n",
        dir = data.display()
    );
    let path = tmp.path().join("runs.yaml");
    fs::write(&path, yaml).unwrap();

    let config = load_run_set_config(&path).unwrap();
    let set = RunSet::from_config(&config).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.runs()[0].files(), &["run_000.shot".to_string()]);
    assert_eq!(set.runs()[1].files().len(), 2);
    assert_eq!(set.runs()[0].aliases().resolve("signal"), "detector/signal");
    assert_eq!(set.runs()[1].aliases().resolve("signal"), "photon/i0/monitor");
    assert_eq!(set.runs()[0].work_dir(), Some(tmp.path().join("work").as_path()));
}
