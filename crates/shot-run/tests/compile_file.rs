mod common;

use std::sync::Arc;

use shot_core::NdArray;
use shot_run::{
    compile_loaded, AverageOpts, Query, Run, SliceSpec, Splits, WarnOnce, WorkerConfig,
};
use shot_store::{Dataset, MemoryStore, ShotFile, SynthSpec};

use common::{assert_close, memory_run};

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        aliases: SynthSpec::aliases(),
        shot_index_dataset: "bunches".to_string(),
        source_period_dataset: "Background_Period".to_string(),
        source_period: None,
        source_offset: 0,
        modulator_period: 2,
        modulator_offset: 1,
        warnings: WarnOnce::default(),
    }
}

fn small_file(shots: &[i64], values: &[f64]) -> ShotFile {
    ShotFile::new()
        .with(
            "bunches",
            NdArray::from_vec(shots.iter().map(|shot| *shot as f64).collect()),
        )
        .with("Background_Period", NdArray::scalar(2.0))
        .with("detector/signal", NdArray::from_vec(values.to_vec()))
}

#[test]
fn buckets_hold_selected_rows_per_condition() {
    let file = small_file(&[10, 11, 12, 13], &[1.0, 2.0, 3.0, 4.0]);
    let query = Query::new("signal")
        .with_rules([None, Some("signal>2.5")])
        .with_splits(Splits::both());
    let rules = shot_rule::compile_rules(&query.rules).unwrap();
    let buckets = compile_loaded(&file, "f", &query, &rules, &worker_config())
        .unwrap()
        .unwrap();
    // Even shots: source off; odd shots: modulator off.
    assert_eq!(buckets.bucket(1, 0).data(), &[1.0, 3.0]);
    assert_eq!(buckets.bucket(2, 0).data(), &[2.0, 4.0]);
    assert!(buckets.bucket(0, 0).is_empty());
    assert_eq!(buckets.bucket(1, 1).data(), &[3.0]);
    assert_eq!(buckets.bucket(2, 1).data(), &[4.0]);

    let sums = buckets.sums().unwrap();
    assert_eq!(sums.counts, vec![0.0, 0.0, 2.0, 1.0, 2.0, 1.0, 0.0, 0.0]);
    let average = sums.average().unwrap();
    assert_eq!(average.average.shape(), &[4, 2, 1]);
    assert_eq!(average.average.data()[2], 2.0);
}

#[test]
fn missing_source_period_leaves_source_on() {
    let file = ShotFile::new()
        .with("bunches", NdArray::from_vec(vec![0.0, 1.0, 2.0, 3.0]))
        .with("detector/signal", NdArray::from_vec(vec![1.0; 4]));
    let query = Query::new("signal").with_splits(Splits {
        source: true,
        modulator: false,
    });
    let rules = shot_rule::compile_rules(&query.rules).unwrap();
    let sums = compile_loaded(&file, "f", &query, &rules, &worker_config())
        .unwrap()
        .unwrap()
        .sums()
        .unwrap();
    assert_eq!(sums.counts, vec![4.0, 0.0, 0.0, 0.0]);
}

#[test]
fn single_sample_quantities_land_in_condition_zero() {
    let run = memory_run(&SynthSpec::default());
    let query = Query::new("scan/delay")
        .with_rules([None, Some("signal>100")])
        .with_splits(Splits::both());
    let average = run.average(&query, &AverageOpts::uncached()).unwrap().average;
    assert_eq!(average.weights.data(), &[2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    assert_eq!(average.average.data()[0], 0.5);
}

#[test]
fn slices_apply_to_trailing_axes() {
    let spec = SynthSpec::default();
    let run = memory_run(&spec);
    let full = run
        .average(&Query::new("vmi"), &AverageOpts::uncached())
        .unwrap()
        .average;
    let sliced = run
        .average(
            &Query::new("vmi").with_slice(SliceSpec::parse(&["1:7:2"]).unwrap()),
            &AverageOpts::uncached(),
        )
        .unwrap()
        .average;
    assert_eq!(full.data_shape(), &[spec.image_width]);
    assert_eq!(sliced.data_shape(), &[3]);
    let picked: Vec<f64> = [1, 3, 5].iter().map(|column| full.average.data()[*column]).collect();
    assert_close(&sliced.average.data()[..3], &picked, 1e-12);
}

#[test]
fn quantity_missing_everywhere_is_an_error_listing_files() {
    let run = memory_run(&SynthSpec::default());
    let err = run
        .average(&Query::new("nothing/here"), &AverageOpts::uncached())
        .unwrap_err();
    assert_eq!(err.code(), "no_data");
    let files = &err.info().context["files"];
    assert!(files.contains("run_000.shot") && files.contains("run_001.shot"));
}

#[test]
fn files_without_the_quantity_are_skipped() {
    let spec = SynthSpec::default();
    let mut store: MemoryStore = spec.memory_store().unwrap();
    store.insert("run_002.shot", small_file(&[0, 1], &[5.0, 7.0]));
    let run = Run::new("mixed", Arc::new(store))
        .unwrap()
        .with_aliases(SynthSpec::aliases());
    let result = run
        .average(&Query::new("vmi"), &AverageOpts::uncached())
        .unwrap();
    assert_eq!(result.average.weights.data()[0], 200.0);
}

#[test]
fn text_quantities_are_rejected() {
    let run = memory_run(&SynthSpec::default());
    let err = run
        .average(&Query::new("meta/mode"), &AverageOpts::uncached())
        .unwrap_err();
    assert_eq!(err.code(), "quantity_not_numeric");
}

#[test]
fn rule_syntax_errors_surface_before_any_work() {
    let run = memory_run(&SynthSpec::default());
    let query = Query::new("signal").with_rules([Some("signal>")]);
    let err = run.average(&query, &AverageOpts::uncached()).unwrap_err();
    assert_eq!(err.code(), "missing_operand");
}

#[test]
fn text_keywords_select_by_string_equality() {
    let file = small_file(&[0, 1], &[1.0, 2.0]).with(
        "meta/mode",
        Dataset::Text {
            values: vec!["pump".to_string()],
        },
    );
    let query = Query::new("signal").with_rules([Some("meta/mode:pump"), Some("meta/mode:probe")]);
    let rules = shot_rule::compile_rules(&query.rules).unwrap();
    let sums = compile_loaded(&file, "f", &query, &rules, &worker_config())
        .unwrap()
        .unwrap()
        .sums()
        .unwrap();
    assert_eq!(&sums.counts[..2], &[2.0, 0.0]);
}

#[test]
fn rule_list_mismatch_is_rejected() {
    let file = small_file(&[0, 1], &[1.0, 2.0]);
    let query = Query::new("signal").with_rules([None, Some("signal>1")]);
    let rules = shot_rule::compile_rules(&[None]).unwrap();
    let err = compile_loaded(&file, "f", &query, &rules, &worker_config()).unwrap_err();
    assert_eq!(err.code(), "rule_count");
    assert_eq!(err.info().context["compiled_rules"], "1");
    assert_eq!(err.info().context["query_rules"], "2");
}
