use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};

/// Transformation applied to every sample before it enters a moment sum.
///
/// Filters shrink the covariance matrix to a subset of channels or reduce
/// channel ranges to their sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleFilter {
    /// Keep the sample as is.
    #[default]
    Identity,
    /// Keep the listed channels, in the listed order.
    Select {
        /// Channel indices.
        indices: Vec<usize>,
    },
    /// Replace the sample by the sums over half-open channel ranges.
    RangeSums {
        /// `(start, stop)` pairs.
        ranges: Vec<(usize, usize)>,
    },
}

impl SampleFilter {
    /// Length of the filtered sample for an input of `len` channels.
    pub fn output_len(&self, len: usize) -> usize {
        match self {
            SampleFilter::Identity => len,
            SampleFilter::Select { indices } => indices.len(),
            SampleFilter::RangeSums { ranges } => ranges.len(),
        }
    }

    /// Applies the filter to one sample.
    pub fn apply(&self, sample: &[f64]) -> Result<Vec<f64>, ShotError> {
        match self {
            SampleFilter::Identity => Ok(sample.to_vec()),
            SampleFilter::Select { indices } => indices
                .iter()
                .map(|index| {
                    sample
                        .get(*index)
                        .copied()
                        .ok_or_else(|| bounds_error(*index, sample.len()))
                })
                .collect(),
            SampleFilter::RangeSums { ranges } => ranges
                .iter()
                .map(|(start, stop)| {
                    if start > stop || *stop > sample.len() {
                        return Err(bounds_error(*stop, sample.len()));
                    }
                    Ok(sample[*start..*stop].iter().sum())
                })
                .collect(),
        }
    }
}

fn bounds_error(index: usize, len: usize) -> ShotError {
    ShotError::Stats(
        ErrorInfo::new("filter_bounds", "sample filter reaches past the sample")
            .with_context("index", index.to_string())
            .with_context("len", len.to_string()),
    )
}
