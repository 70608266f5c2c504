use std::fs;

use shot_core::NdArray;
use shot_store::{Dataset, ShotFile, SHOT_FILE_SCHEMA};
use tempfile::tempdir;

fn sample() -> ShotFile {
    ShotFile::new()
        .with("bunches", NdArray::from_vec(vec![10.0, 11.0, 12.0]))
        .with(
            "camera/image",
            NdArray::new(vec![3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
        )
        .with(
            "meta/mode",
            Dataset::Text {
                values: vec!["pump".into()],
            },
        )
}

#[test]
fn file_survives_disk_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/run_000.shot");
    let file = sample();
    file.write(&path).unwrap();
    let restored = ShotFile::read(&path).unwrap();
    assert_eq!(restored, file);
    assert_eq!(restored.schema(), SHOT_FILE_SCHEMA);
    assert_eq!(restored.shot_indices("bunches").unwrap(), vec![10, 11, 12]);
}

#[test]
fn truncated_file_is_a_serde_error_with_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.shot");
    let bytes = sample().to_bytes().unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    let err = ShotFile::read(&path).unwrap_err();
    assert_eq!(err.code(), "shot_deserialize");
    assert!(err.info().context.contains_key("path"));
}

#[test]
fn missing_shot_index_is_a_store_error() {
    let err = sample().shot_indices("shots").unwrap_err();
    assert_eq!(err.code(), "missing_shot_index");
    assert!(err.to_string().starts_with("store error"));
}

#[test]
fn datasets_list_in_name_order() {
    let file = sample();
    let names: Vec<&str> = file.datasets().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["bunches", "camera/image", "meta/mode"]);
    assert_eq!(file.dataset("camera/image").unwrap().shape(), vec![3, 2]);
    assert_eq!(file.dataset("meta/mode").unwrap().kind(), "text");
}
