//! Canonical JSON encoding and content hashing for cache keys and reports.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use shot_core::errors::{ErrorInfo, ShotError};

fn json_error(code: &str, err: serde_json::Error) -> ShotError {
    ShotError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Rebuilds every object with its keys in sorted order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        scalar => scalar,
    }
}

fn canonical_value<T: Serialize>(value: &T) -> Result<Value, ShotError> {
    serde_json::to_value(value)
        .map(sort_keys)
        .map_err(|err| json_error("json_serialize", err))
}

/// Compact canonical JSON bytes.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ShotError> {
    serde_json::to_vec(&canonical_value(value)?).map_err(|err| json_error("json_write", err))
}

/// Indented canonical JSON, used for reports printed by the CLI.
pub fn to_canonical_json_pretty<T: Serialize>(value: &T) -> Result<String, ShotError> {
    serde_json::to_string_pretty(&canonical_value(value)?)
        .map_err(|err| json_error("json_write", err))
}

/// Hex SHA-256 of the canonical JSON encoding of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, ShotError> {
    let digest = Sha256::digest(to_canonical_json_bytes(value)?);
    Ok(format!("{digest:x}"))
}
