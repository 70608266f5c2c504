use std::fs;

use shot_store::{DirStore, MemoryStore, ShotStore, SynthSpec};
use tempfile::tempdir;

#[test]
fn dir_store_lists_only_shot_files_sorted() {
    let dir = tempdir().unwrap();
    let spec = SynthSpec {
        files: 3,
        shots: 4,
        ..SynthSpec::default()
    };
    spec.write_run(dir.path()).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
    fs::create_dir(dir.path().join("sub.shot")).unwrap();

    let store = DirStore::open(dir.path()).unwrap();
    assert_eq!(
        store.list().unwrap(),
        vec!["run_000.shot", "run_001.shot", "run_002.shot"]
    );
    assert_eq!(store.location(), Some(dir.path()));
    let file = store.load("run_001.shot").unwrap();
    assert_eq!(file.shot_indices("bunches").unwrap(), vec![4, 5, 6, 7]);
}

#[test]
fn dir_store_reports_missing_files() {
    let dir = tempdir().unwrap();
    let store = DirStore::open(dir.path()).unwrap();
    let err = store.load("absent.shot").unwrap_err();
    assert_eq!(err.code(), "missing_file");
    assert_eq!(
        err.info().context.get("file").map(String::as_str),
        Some("absent.shot")
    );
}

#[test]
fn dir_store_requires_existing_directory() {
    let dir = tempdir().unwrap();
    let err = DirStore::open(dir.path().join("nope")).unwrap_err();
    assert_eq!(err.code(), "data_dir");
}

#[test]
fn memory_store_matches_generated_files() {
    let spec = SynthSpec::default();
    let store: MemoryStore = spec.memory_store().unwrap();
    assert_eq!(store.list().unwrap(), vec!["run_000.shot", "run_001.shot"]);
    assert!(store.location().is_none());
    assert_eq!(
        store.load("run_000.shot").unwrap(),
        spec.generate_file(0).unwrap()
    );
}
