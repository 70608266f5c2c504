use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter, Log, Metadata, Record};
use shot_core::NdArray;
use shot_run::{AverageOpts, ClassifierConfig, Query, Run, Splits};
use shot_store::{MemoryStore, ShotFile};

static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct CaptureWarnings;

impl Log for CaptureWarnings {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            WARNINGS.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureWarnings = CaptureWarnings;

fn install_logger() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Warn);
}

fn warnings_matching(needles: &[&str]) -> usize {
    WARNINGS
        .lock()
        .unwrap()
        .iter()
        .filter(|message| needles.iter().all(|needle| message.contains(needle)))
        .count()
}

/// Two files without a source period dataset, holding a per-shot trace and
/// a single-sample pulse energy.
fn run_without_periods() -> Run {
    let file = || {
        ShotFile::new()
            .with("bunches", NdArray::from_vec(vec![0.0, 1.0, 2.0, 3.0]))
            .with("pulse_energy", NdArray::scalar(1.5))
            .with("detector/trace", NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0]))
    };
    let store = MemoryStore::new()
        .with("degraded_0.shot", file())
        .with("degraded_1.shot", file());
    Run::new("degraded", Arc::new(store))
        .unwrap()
        .with_classifier(ClassifierConfig {
            modulator_offset: Some(0),
            ..ClassifierConfig::default()
        })
}

#[test]
fn file_warnings_are_logged_once_per_file_and_quantity() {
    install_logger();
    let run = run_without_periods();
    let opts = AverageOpts {
        block_size: Some(1),
        ..AverageOpts::uncached()
    };

    let energy = Query::new("pulse_energy").with_splits(Splits::both());
    for _ in 0..2 {
        run.average(&energy, &opts).unwrap();
    }
    run.collect(&energy, &opts).unwrap();
    assert_eq!(warnings_matching(&["pulse_energy", "not per-shot"]), 2);
    assert_eq!(
        warnings_matching(&["pulse_energy", "degraded_0.shot", "not per-shot"]),
        1
    );

    let trace = Query::new("detector/trace").with_splits(Splits::both());
    for _ in 0..2 {
        run.average(&trace, &opts).unwrap();
    }
    assert_eq!(warnings_matching(&["Background_Period", "degraded_"]), 2);
    assert_eq!(
        warnings_matching(&["Background_Period", "degraded_1.shot"]),
        1
    );

    // A fresh run starts with an empty record.
    run_without_periods().average(&energy, &opts).unwrap();
    assert_eq!(warnings_matching(&["pulse_energy", "not per-shot"]), 4);
}
