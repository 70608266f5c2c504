use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::NdArray;

fn combine_error(code: &str, message: &str, left: &[usize], right: &[usize]) -> ShotError {
    ShotError::Stats(
        ErrorInfo::new(code, message)
            .with_context("left", format!("{left:?}"))
            .with_context("right", format!("{right:?}")),
    )
}

/// Per-bucket weighted averages with their total weights.
///
/// `average` has shape `bucket_shape ++ data_shape`; `weights` has shape
/// `bucket_shape`. Zero-weight buckets hold zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAverage {
    /// Leading bucket axes (conditions, rules).
    pub bucket_shape: Vec<usize>,
    /// Averages per bucket.
    pub average: NdArray,
    /// Total weight per bucket.
    pub weights: NdArray,
}

/// Run-set level stack of weighted averages along a new leading axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedAverage {
    /// Averages, shape `[n] ++ bucket_shape ++ data_shape`.
    pub average: NdArray,
    /// Weights, shape `[n] ++ bucket_shape`.
    pub weights: NdArray,
}

impl WeightedAverage {
    /// Turns per-bucket sums and counts into averages.
    ///
    /// `sums` has shape `bucket_shape ++ data_shape` and `counts` one entry
    /// per bucket. A zero count divides by one.
    pub fn from_sums(
        bucket_shape: Vec<usize>,
        sums: NdArray,
        counts: &[f64],
    ) -> Result<Self, ShotError> {
        let buckets: usize = bucket_shape.iter().product();
        if counts.len() != buckets || sums.shape().get(..bucket_shape.len()) != Some(&bucket_shape[..]) {
            return Err(combine_error(
                "bucket_shape",
                "sums and counts disagree with the bucket shape",
                sums.shape(),
                &[counts.len()],
            ));
        }
        let width = if buckets == 0 { 0 } else { sums.len() / buckets };
        let mut average = sums;
        for (bucket, count) in counts.iter().enumerate() {
            let divisor = if *count == 0.0 { 1.0 } else { *count };
            for value in &mut average.data_mut()[bucket * width..(bucket + 1) * width] {
                *value /= divisor;
            }
        }
        let weights = NdArray::new(bucket_shape.clone(), counts.to_vec())?;
        Ok(Self {
            bucket_shape,
            average,
            weights,
        })
    }

    /// Number of buckets.
    pub fn buckets(&self) -> usize {
        self.weights.len()
    }

    /// Shape of the data held by one bucket.
    pub fn data_shape(&self) -> &[usize] {
        &self.average.shape()[self.bucket_shape.len()..]
    }

    fn bucket_width(&self) -> usize {
        self.data_shape().iter().product()
    }

    /// Combines two averages: `(a·n_a + b·n_b) / (n_a + n_b)` per bucket.
    pub fn combine(&self, other: &WeightedAverage) -> Result<WeightedAverage, ShotError> {
        if self.average.shape() != other.average.shape() || self.bucket_shape != other.bucket_shape
        {
            return Err(combine_error(
                "combine_shape",
                "weighted averages differ in shape",
                self.average.shape(),
                other.average.shape(),
            ));
        }
        let width = self.bucket_width();
        let mut average = self.average.clone();
        let mut weights = self.weights.clone();
        let left = self.average.data();
        let right = other.average.data();
        for bucket in 0..self.buckets() {
            let n_a = self.weights.data()[bucket];
            let n_b = other.weights.data()[bucket];
            let total = n_a + n_b;
            let divisor = if total == 0.0 { 1.0 } else { total };
            let span = bucket * width..(bucket + 1) * width;
            for ((out, a), b) in average.data_mut()[span.clone()]
                .iter_mut()
                .zip(&left[span.clone()])
                .zip(&right[span])
            {
                *out = (a * n_a + b * n_b) / divisor;
            }
            weights.data_mut()[bucket] = total;
        }
        Ok(WeightedAverage {
            bucket_shape: self.bucket_shape.clone(),
            average,
            weights,
        })
    }

    /// Folds averages in order; `None` for an empty input.
    pub fn fold<'a, I>(parts: I) -> Result<Option<WeightedAverage>, ShotError>
    where
        I: IntoIterator<Item = &'a WeightedAverage>,
    {
        let mut acc: Option<WeightedAverage> = None;
        for part in parts {
            acc = Some(match acc {
                None => part.clone(),
                Some(current) => current.combine(part)?,
            });
        }
        Ok(acc)
    }

    /// Stacks averages along a new leading axis.
    pub fn stack(parts: &[WeightedAverage]) -> Result<StackedAverage, ShotError> {
        let averages: Vec<NdArray> = parts.iter().map(|part| part.average.clone()).collect();
        let weights: Vec<NdArray> = parts.iter().map(|part| part.weights.clone()).collect();
        Ok(StackedAverage {
            average: NdArray::stack(&averages)?,
            weights: NdArray::stack(&weights)?,
        })
    }
}
