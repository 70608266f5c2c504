use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::NdArray;

use crate::filter::SampleFilter;

/// Weighted co-moment sums of two sample streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentSums {
    /// Sum of outer products of deviations, scaled by the weight.
    pub covariance_sum: DMatrix<f64>,
    /// Weighted sum of the first stream.
    pub sum_1: DVector<f64>,
    /// Weighted sum of the second stream.
    pub sum_2: DVector<f64>,
    /// Weighted sample count.
    pub count: f64,
}

fn dims_error(expected: (usize, usize), found: (usize, usize)) -> ShotError {
    ShotError::Stats(
        ErrorInfo::new("moment_dims", "moment sums have different dimensions")
            .with_context("expected", format!("{}x{}", expected.0, expected.1))
            .with_context("found", format!("{}x{}", found.0, found.1)),
    )
}

impl MomentSums {
    /// Empty sums for samples of the given lengths.
    pub fn zeros(len_1: usize, len_2: usize) -> Self {
        Self {
            covariance_sum: DMatrix::zeros(len_1, len_2),
            sum_1: DVector::zeros(len_1),
            sum_2: DVector::zeros(len_2),
            count: 0.0,
        }
    }

    /// `(len_1, len_2)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.sum_1.len(), self.sum_2.len())
    }

    /// Mean of the first stream (zeros when empty).
    pub fn mean_1(&self) -> DVector<f64> {
        if self.count == 0.0 {
            return DVector::zeros(self.sum_1.len());
        }
        &self.sum_1 / self.count
    }

    /// Mean of the second stream (zeros when empty).
    pub fn mean_2(&self) -> DVector<f64> {
        if self.count == 0.0 {
            return DVector::zeros(self.sum_2.len());
        }
        &self.sum_2 / self.count
    }

    /// Population covariance `C / n` (zeros when empty).
    pub fn covariance(&self) -> DMatrix<f64> {
        if self.count == 0.0 {
            let (rows, cols) = self.covariance_sum.shape();
            return DMatrix::zeros(rows, cols);
        }
        &self.covariance_sum / self.count
    }

    /// Chan's parallel combination; empty operands are absorbed.
    pub fn merge(&self, other: &MomentSums) -> Result<MomentSums, ShotError> {
        if self.dims() != other.dims() {
            return Err(dims_error(self.dims(), other.dims()));
        }
        if other.count == 0.0 {
            return Ok(self.clone());
        }
        if self.count == 0.0 {
            return Ok(other.clone());
        }
        let total = self.count + other.count;
        let delta_1 = self.mean_1() - other.mean_1();
        let delta_2 = self.mean_2() - other.mean_2();
        let correction = (&delta_1 * delta_2.transpose()) * (self.count * other.count / total);
        Ok(MomentSums {
            covariance_sum: &self.covariance_sum + &other.covariance_sum + correction,
            sum_1: &self.sum_1 + &other.sum_1,
            sum_2: &self.sum_2 + &other.sum_2,
            count: total,
        })
    }
}

/// Single-pass Welford accumulator over paired samples.
///
/// The co-moment update uses the new mean of the first stream and the old
/// mean of the second: `C += outer(x - mean_x', y - mean_y)`.
#[derive(Debug, Clone)]
pub struct MomentAccumulator {
    n: usize,
    mean_x: DVector<f64>,
    mean_y: DVector<f64>,
    comoment: DMatrix<f64>,
}

impl MomentAccumulator {
    /// Accumulator for samples of lengths `len_1` and `len_2`.
    pub fn new(len_1: usize, len_2: usize) -> Self {
        Self {
            n: 0,
            mean_x: DVector::zeros(len_1),
            mean_y: DVector::zeros(len_2),
            comoment: DMatrix::zeros(len_1, len_2),
        }
    }

    /// Number of pairs seen.
    pub fn len(&self) -> usize {
        self.n
    }

    /// True before the first pair.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Adds one `(x, y)` pair.
    pub fn push(&mut self, x: &[f64], y: &[f64]) -> Result<(), ShotError> {
        if x.len() != self.mean_x.len() || y.len() != self.mean_y.len() {
            return Err(dims_error(
                (self.mean_x.len(), self.mean_y.len()),
                (x.len(), y.len()),
            ));
        }
        let x = DVector::from_column_slice(x);
        let y = DVector::from_column_slice(y);
        self.n += 1;
        let n = self.n as f64;
        let next_mean_x = &self.mean_x + (&x - &self.mean_x) / n;
        let next_mean_y = &self.mean_y + (&y - &self.mean_y) / n;
        self.comoment += (&x - &next_mean_x) * (&y - &self.mean_y).transpose();
        self.mean_x = next_mean_x;
        self.mean_y = next_mean_y;
        Ok(())
    }

    /// Scales the accumulated moments by `weight`.
    pub fn finish(self, weight: f64) -> MomentSums {
        let n = self.n as f64;
        MomentSums {
            covariance_sum: self.comoment * weight,
            sum_1: self.mean_x * (n * weight),
            sum_2: self.mean_y * (n * weight),
            count: n * weight,
        }
    }
}

/// Accumulates co-moment sums over the rows of `samples_1` (and `samples_2`).
///
/// Without a second stream the first stream's rows are reused as `y`; each
/// side is still passed through its own filter.
pub fn accumulate(
    samples_1: &NdArray,
    samples_2: Option<&NdArray>,
    filter_1: Option<&SampleFilter>,
    filter_2: Option<&SampleFilter>,
    weight: f64,
) -> Result<MomentSums, ShotError> {
    let identity = SampleFilter::Identity;
    let filter_1 = filter_1.unwrap_or(&identity);
    let filter_2 = filter_2.unwrap_or(&identity);
    let second = samples_2.unwrap_or(samples_1);
    if second.rows() != samples_1.rows() {
        return Err(ShotError::Stats(
            ErrorInfo::new("sample_count", "sample streams differ in length")
                .with_context("first", samples_1.rows().to_string())
                .with_context("second", second.rows().to_string()),
        ));
    }
    let mut acc = MomentAccumulator::new(
        filter_1.output_len(samples_1.row_len()),
        filter_2.output_len(second.row_len()),
    );
    for (row_1, row_2) in samples_1.iter_rows().zip(second.iter_rows()) {
        acc.push(&filter_1.apply(row_1)?, &filter_2.apply(row_2)?)?;
    }
    Ok(acc.finish(weight))
}
