//! Versions and provenance stamped on shot files and cache artifacts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `major.minor.patch` of a persisted layout; only `major` gates decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when old readers can no longer decode.
    pub major: u32,
    /// Bumped for additive changes.
    pub minor: u32,
    /// Bumped for fixes.
    pub patch: u32,
}

impl SchemaVersion {
    /// Version from its parts.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a payload written under `other` can be decoded under `self`.
    pub fn reads(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance recorded next to every cached aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArtifactProvenance {
    /// Cache key.
    pub key: String,
    /// Files folded into the artifact, in run order.
    pub files: Vec<String>,
    /// RFC 3339 write time; informational only.
    pub created_at: String,
    /// Crate name to version of the writer.
    pub tool_versions: BTreeMap<String, String>,
}
