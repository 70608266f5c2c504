#![deny(missing_docs)]
#![doc = "Single-pass moment statistics and the weighted-average combination rule."]

/// Weighted-average combination.
pub mod combine;
/// Per-sample filters for moment sums.
pub mod filter;
/// Welford accumulation and Chan merging.
pub mod moments;

pub use combine::{StackedAverage, WeightedAverage};
pub use filter::SampleFilter;
pub use moments::{accumulate, MomentAccumulator, MomentSums};
