use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maps short keywords to dataset paths; unknown keywords resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasMap {
    entries: BTreeMap<String, String>,
}

impl AliasMap {
    /// Creates an empty alias map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias, builder style.
    pub fn with(mut self, keyword: impl Into<String>, path: impl Into<String>) -> Self {
        self.insert(keyword, path);
        self
    }

    /// Adds or replaces an alias.
    pub fn insert(&mut self, keyword: impl Into<String>, path: impl Into<String>) {
        self.entries.insert(keyword.into(), path.into());
    }

    /// Resolves a keyword to its dataset path.
    pub fn resolve<'a>(&'a self, keyword: &'a str) -> &'a str {
        self.entries
            .get(keyword)
            .map(String::as_str)
            .unwrap_or(keyword)
    }

    /// Fills in entries from `defaults` that are not already present.
    pub fn merged_with(&self, defaults: &AliasMap) -> AliasMap {
        let mut merged = defaults.clone();
        for (keyword, path) in &self.entries {
            merged.insert(keyword.clone(), path.clone());
        }
        merged
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no alias is defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for AliasMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
