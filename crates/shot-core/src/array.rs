//! Dense row-major `f64` arrays used for datasets, bucket sums and averages.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, ShotError};

fn shape_error(code: &str, message: impl Into<String>) -> ShotError {
    ShotError::Stats(ErrorInfo::new(code, message))
}

fn shape_string(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|dim| dim.to_string()).collect();
    format!("({})", dims.join(", "))
}

/// Dense n-dimensional array stored in row-major order.
///
/// A zero-dimensional array (empty shape) holds exactly one element. Axis 0
/// is the "row" axis whenever the array is used as a sequence of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    /// Builds an array from a shape and matching row-major data.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ShotError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ShotError::Stats(
                ErrorInfo::new("array_shape", "data length does not match shape")
                    .with_context("shape", shape_string(&shape))
                    .with_context("len", data.len().to_string()),
            ));
        }
        Ok(Self { shape, data })
    }

    /// Zero-filled array of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    /// Zero-dimensional array holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// One-dimensional array over the given values.
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: values,
        }
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element storage.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable row-major element storage.
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Length of axis 0 (one for zero-dimensional arrays).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Shape of a single row (everything after axis 0).
    pub fn inner_shape(&self) -> &[usize] {
        if self.shape.is_empty() {
            &[]
        } else {
            &self.shape[1..]
        }
    }

    /// Number of elements in a single row.
    pub fn row_len(&self) -> usize {
        self.inner_shape().iter().product()
    }

    /// Borrow row `index` along axis 0.
    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.row_len();
        &self.data[index * width..(index + 1) * width]
    }

    /// Iterates over the rows along axis 0.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let width = self.row_len();
        (0..self.rows()).map(move |index| &self.data[index * width..(index + 1) * width])
    }

    /// Returns a copy with a new shape holding the same number of elements.
    pub fn reshape(&self, shape: Vec<usize>) -> Result<Self, ShotError> {
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(ShotError::Stats(
                ErrorInfo::new("array_reshape", "cannot reshape array")
                    .with_context("from", shape_string(&self.shape))
                    .with_context("to", shape_string(&shape)),
            ));
        }
        Ok(Self {
            shape,
            data: self.data.clone(),
        })
    }

    /// Keeps the rows whose mask entry is true.
    pub fn select_rows(&self, mask: &[bool]) -> Result<Self, ShotError> {
        if mask.len() != self.rows() {
            return Err(ShotError::Stats(
                ErrorInfo::new("mask_length", "row mask does not match axis 0")
                    .with_context("rows", self.rows().to_string())
                    .with_context("mask", mask.len().to_string()),
            ));
        }
        let width = self.row_len();
        let kept = mask.iter().filter(|keep| **keep).count();
        let mut data = Vec::with_capacity(kept * width);
        for (index, keep) in mask.iter().enumerate() {
            if *keep {
                data.extend_from_slice(&self.data[index * width..(index + 1) * width]);
            }
        }
        let mut shape = self.inner_shape().to_vec();
        shape.insert(0, kept);
        Ok(Self { shape, data })
    }

    /// Sums along axis 0; an array without rows sums to zeros of the row shape.
    pub fn sum_rows(&self) -> Self {
        let width = self.row_len();
        let mut data = vec![0.0; width];
        for row in self.iter_rows() {
            for (acc, value) in data.iter_mut().zip(row) {
                *acc += value;
            }
        }
        Self {
            shape: self.inner_shape().to_vec(),
            data,
        }
    }

    /// Concatenates arrays along axis 0; all parts must share the row shape.
    pub fn concat_rows(parts: &[NdArray]) -> Result<Self, ShotError> {
        let first = parts
            .first()
            .ok_or_else(|| shape_error("concat_empty", "nothing to concatenate"))?;
        let inner = first.inner_shape().to_vec();
        let mut data = Vec::new();
        let mut rows = 0;
        for part in parts {
            if part.inner_shape() != inner.as_slice() {
                return Err(ShotError::Stats(
                    ErrorInfo::new("concat_shape", "row shapes differ")
                        .with_context("expected", shape_string(&inner))
                        .with_context("found", shape_string(part.inner_shape())),
                ));
            }
            rows += part.rows();
            data.extend_from_slice(&part.data);
        }
        let mut shape = inner;
        shape.insert(0, rows);
        Ok(Self { shape, data })
    }

    /// Stacks equally shaped arrays along a new leading axis.
    pub fn stack(parts: &[NdArray]) -> Result<Self, ShotError> {
        let first = parts
            .first()
            .ok_or_else(|| shape_error("stack_empty", "nothing to stack"))?;
        let mut data = Vec::with_capacity(first.len() * parts.len());
        for part in parts {
            if part.shape != first.shape {
                return Err(ShotError::Stats(
                    ErrorInfo::new("stack_shape", "stacked arrays differ in shape")
                        .with_context("expected", shape_string(&first.shape))
                        .with_context("found", shape_string(&part.shape)),
                ));
            }
            data.extend_from_slice(&part.data);
        }
        let mut shape = first.shape.clone();
        shape.insert(0, parts.len());
        Ok(Self { shape, data })
    }

    /// Gathers the given indices along every axis.
    ///
    /// `indices` must hold one index list per axis; each list may repeat,
    /// reorder or omit positions of that axis.
    pub fn gather(&self, indices: &[Vec<usize>]) -> Result<Self, ShotError> {
        if indices.len() != self.ndim() {
            return Err(ShotError::Stats(
                ErrorInfo::new("gather_axes", "one index list per axis is required")
                    .with_context("ndim", self.ndim().to_string())
                    .with_context("lists", indices.len().to_string()),
            ));
        }
        for (axis, list) in indices.iter().enumerate() {
            if let Some(bad) = list.iter().find(|index| **index >= self.shape[axis]) {
                return Err(ShotError::Stats(
                    ErrorInfo::new("gather_bounds", "index out of bounds")
                        .with_context("axis", axis.to_string())
                        .with_context("index", bad.to_string()),
                ));
            }
        }
        let shape: Vec<usize> = indices.iter().map(Vec::len).collect();
        let total: usize = shape.iter().product();
        let mut strides = vec![1usize; self.ndim()];
        for axis in (0..self.ndim().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        let mut data = Vec::with_capacity(total);
        let mut cursor = vec![0usize; shape.len()];
        for _ in 0..total {
            let offset: usize = cursor
                .iter()
                .enumerate()
                .map(|(axis, position)| indices[axis][*position] * strides[axis])
                .sum();
            data.push(self.data[offset]);
            for axis in (0..cursor.len()).rev() {
                cursor[axis] += 1;
                if cursor[axis] < shape[axis] {
                    break;
                }
                cursor[axis] = 0;
            }
        }
        Ok(Self { shape, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_rows_keeps_inner_shape_when_nothing_selected() {
        let array = NdArray::new(vec![3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let empty = array.select_rows(&[false, false, false]).unwrap();
        assert_eq!(empty.shape(), &[0, 2]);
        assert_eq!(empty.sum_rows().data(), &[0.0, 0.0]);
    }

    #[test]
    fn gather_picks_strided_columns() {
        let array = NdArray::new(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let picked = array.gather(&[vec![0, 1], vec![0, 2]]).unwrap();
        assert_eq!(picked.shape(), &[2, 2]);
        assert_eq!(picked.data(), &[0.0, 2.0, 3.0, 5.0]);
    }
}
