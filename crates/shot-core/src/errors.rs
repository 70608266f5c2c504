//! Error surface shared by every shot aggregation crate.
//!
//! Each family wraps an [`ErrorInfo`]; callers match on the family and the
//! stable `code`, never on the message.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context of a [`ShotError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable code, e.g. `missing_operand` or `no_data`.
    pub code: String,
    /// Diagnostic message.
    pub message: String,
    /// File names, keywords, token positions and similar.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload without context.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds or replaces a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Error returned by every fallible operation of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ShotError {
    /// Rule syntax and evaluation errors.
    #[error("rule error: {0}")]
    Rule(ErrorInfo),
    /// Shot file and dataset access errors.
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// Shot classification errors.
    #[error("classify error: {0}")]
    Classify(ErrorInfo),
    /// File-level compilation errors.
    #[error("compile error: {0}")]
    Compile(ErrorInfo),
    /// Cache layout and persistence errors.
    #[error("cache error: {0}")]
    Cache(ErrorInfo),
    /// Statistics and shape-compatibility errors.
    #[error("stats error: {0}")]
    Stats(ErrorInfo),
    /// Configuration loading errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ShotError {
    /// Payload of the error, whatever its family.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ShotError::Rule(info)
            | ShotError::Store(info)
            | ShotError::Classify(info)
            | ShotError::Compile(info)
            | ShotError::Cache(info)
            | ShotError::Stats(info)
            | ShotError::Config(info)
            | ShotError::Serde(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            ShotError::Rule(info)
            | ShotError::Store(info)
            | ShotError::Classify(info)
            | ShotError::Compile(info)
            | ShotError::Cache(info)
            | ShotError::Stats(info)
            | ShotError::Config(info)
            | ShotError::Serde(info) => info,
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Lower-case family name, as printed by `Display`.
    pub fn family(&self) -> &'static str {
        match self {
            ShotError::Rule(_) => "rule",
            ShotError::Store(_) => "store",
            ShotError::Classify(_) => "classify",
            ShotError::Compile(_) => "compile",
            ShotError::Cache(_) => "cache",
            ShotError::Stats(_) => "stats",
            ShotError::Config(_) => "config",
            ShotError::Serde(_) => "serde",
        }
    }

    /// Adds a context entry unless the error already carries that key.
    ///
    /// Used while an error travels outwards, so the innermost value wins.
    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.info_mut()
            .context
            .entry(key.to_string())
            .or_insert_with(|| value.into());
        self
    }
}
