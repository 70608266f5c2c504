#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use shot_run::{ClassifierConfig, Run, Splits};
use shot_store::{DirStore, SynthSpec};
use tempfile::TempDir;

/// Synthetic run written below `<tmp>/rawdata/run_a` so caches land in `<tmp>/work`.
pub fn synth_dir(spec: &SynthSpec) -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("rawdata").join("run_a");
    fs::create_dir_all(&data).unwrap();
    spec.write_run(&data).unwrap();
    (tmp, data)
}

pub fn classifier_for(spec: &SynthSpec) -> ClassifierConfig {
    ClassifierConfig {
        source_offset: spec.source_offset,
        modulator_period: spec.modulator_period,
        ..ClassifierConfig::default()
    }
}

pub fn dir_run(spec: &SynthSpec, data: &std::path::Path) -> Run {
    Run::new("run_a", Arc::new(DirStore::open(data).unwrap()))
        .unwrap()
        .with_aliases(SynthSpec::aliases())
        .with_classifier(classifier_for(spec))
}

pub fn memory_run(spec: &SynthSpec) -> Run {
    Run::new("memory", Arc::new(spec.memory_store().unwrap()))
        .unwrap()
        .with_aliases(SynthSpec::aliases())
        .with_classifier(classifier_for(spec))
}

/// Shots per condition the synthetic generator puts in, for the default classifier.
pub fn expected_condition_counts(spec: &SynthSpec, splits: Splits) -> [f64; 4] {
    let mut counts = [0.0; 4];
    for file in 0..spec.files {
        for shot in spec.shot_indices(file) {
            let source_off = splits.source
                && (shot - spec.source_offset).rem_euclid(spec.source_period) == 0;
            let modulator_off = splits.modulator
                && (shot - spec.modulator_offset).rem_euclid(spec.modulator_period) == 0;
            let condition = usize::from(source_off) + 2 * usize::from(modulator_off);
            counts[condition] += 1.0;
        }
    }
    counts
}

pub fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() <= tol * (1.0 + x.abs().max(y.abs())), "{x} vs {y}");
    }
}
