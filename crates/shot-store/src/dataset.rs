use serde::{Deserialize, Serialize};
use shot_core::NdArray;

/// A named dataset stored in a shot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    /// Numeric array of any rank.
    Numeric(NdArray),
    /// Text labels, either one per shot or a single shared label.
    Text {
        /// Label values.
        values: Vec<String>,
    },
}

impl Dataset {
    /// Numeric payload, if any.
    pub fn as_numeric(&self) -> Option<&NdArray> {
        match self {
            Dataset::Numeric(array) => Some(array),
            Dataset::Text { .. } => None,
        }
    }

    /// Shape description used by listings.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Dataset::Numeric(array) => array.shape().to_vec(),
            Dataset::Text { values } => vec![values.len()],
        }
    }

    /// Short kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Numeric(_) => "numeric",
            Dataset::Text { .. } => "text",
        }
    }
}

impl From<NdArray> for Dataset {
    fn from(array: NdArray) -> Self {
        Dataset::Numeric(array)
    }
}
