use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shot_core::errors::{ErrorInfo, ShotError};
use shot_core::NdArray;

fn slice_error(code: &str, message: &str, text: &str) -> ShotError {
    ShotError::Compile(ErrorInfo::new(code, message).with_context("slice", text))
}

/// `start:stop:step` over one axis, with negative indices counted from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisSlice {
    /// First index, defaulting to the start (or end for negative steps).
    pub start: Option<i64>,
    /// Exclusive stop, defaulting to the end (or before the start for negative steps).
    pub stop: Option<i64>,
    /// Non-zero step.
    pub step: i64,
}

impl Default for AxisSlice {
    fn default() -> Self {
        Self::full()
    }
}

impl AxisSlice {
    /// The whole axis.
    pub const fn full() -> Self {
        Self {
            start: None,
            stop: None,
            step: 1,
        }
    }

    /// Half-open range with unit step.
    pub const fn range(start: i64, stop: i64) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            step: 1,
        }
    }

    /// Selected positions of an axis of length `len`.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let resolve = |index: i64, low: i64, high: i64| -> i64 {
            let index = if index < 0 { index + len } else { index };
            index.clamp(low, high)
        };
        let mut out = Vec::new();
        if self.step > 0 {
            let start = self.start.map(|s| resolve(s, 0, len)).unwrap_or(0);
            let stop = self.stop.map(|s| resolve(s, 0, len)).unwrap_or(len);
            let mut index = start;
            while index < stop {
                out.push(index as usize);
                index += self.step;
            }
        } else {
            let start = self.start.map(|s| resolve(s, -1, len - 1)).unwrap_or(len - 1);
            let stop = self.stop.map(|s| resolve(s, -1, len - 1)).unwrap_or(-1);
            let mut index = start;
            while index > stop {
                out.push(index as usize);
                index += self.step;
            }
        }
        out
    }
}

impl FromStr for AxisSlice {
    type Err = ShotError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parse_bound = |part: &str| -> Result<Option<i64>, ShotError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<i64>()
                .map(Some)
                .map_err(|_| slice_error("slice_parse", "slice bound is not an integer", text))
        };
        let parts: Vec<&str> = text.split(':').collect();
        match parts.as_slice() {
            [single] => {
                let index = parse_bound(single)?
                    .ok_or_else(|| slice_error("slice_parse", "empty slice", text))?;
                let stop = match index {
                    -1 => None,
                    _ => Some(index.checked_add(1).ok_or_else(|| {
                        slice_error("slice_bound", "slice index out of range", text)
                    })?),
                };
                Ok(Self {
                    start: Some(index),
                    stop,
                    step: 1,
                })
            }
            [start, stop] => Ok(Self {
                start: parse_bound(start)?,
                stop: parse_bound(stop)?,
                step: 1,
            }),
            [start, stop, step] => {
                let step = parse_bound(step)?.unwrap_or(1);
                if step == 0 {
                    return Err(slice_error("slice_step", "slice step cannot be zero", text));
                }
                Ok(Self {
                    start: parse_bound(start)?,
                    stop: parse_bound(stop)?,
                    step,
                })
            }
            _ => Err(slice_error("slice_parse", "too many ':' in slice", text)),
        }
    }
}

impl fmt::Display for AxisSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str(":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        if self.step != 1 {
            write!(f, ":{}", self.step)?;
        }
        Ok(())
    }
}

/// Slices for the trailing (non-shot) axes of a quantity; missing axes stay whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceSpec {
    axes: Vec<AxisSlice>,
}

impl SliceSpec {
    /// No slicing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Slices for the first trailing axes.
    pub fn new(axes: Vec<AxisSlice>) -> Self {
        Self { axes }
    }

    /// Parses one `start:stop:step` string per axis.
    pub fn parse<S: AsRef<str>>(parts: &[S]) -> Result<Self, ShotError> {
        let axes = parts
            .iter()
            .map(|part| part.as_ref().parse())
            .collect::<Result<Vec<AxisSlice>, _>>()?;
        Ok(Self { axes })
    }

    /// Per-axis slices.
    pub fn axes(&self) -> &[AxisSlice] {
        &self.axes
    }

    /// True when nothing is sliced.
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Applies the slices to the axes after axis 0 of `array`.
    pub fn apply(&self, array: &NdArray) -> Result<NdArray, ShotError> {
        if self.axes.is_empty() {
            return Ok(array.clone());
        }
        let trailing = array.ndim().saturating_sub(1);
        if self.axes.len() > trailing {
            return Err(ShotError::Compile(
                ErrorInfo::new("slice_axes", "more slices than trailing axes")
                    .with_context("slices", self.axes.len().to_string())
                    .with_context("shape", format!("{:?}", array.shape())),
            ));
        }
        let indices: Vec<Vec<usize>> = array
            .shape()
            .iter()
            .enumerate()
            .map(|(axis, len)| match axis.checked_sub(1).and_then(|i| self.axes.get(i)) {
                Some(slice) => slice.indices(*len),
                None => (0..*len).collect(),
            })
            .collect();
        array.gather(&indices)
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.axes.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(text: &str, len: usize) -> Vec<usize> {
        text.parse::<AxisSlice>().unwrap().indices(len)
    }

    #[test]
    fn python_slice_semantics() {
        assert_eq!(idx(":", 4), vec![0, 1, 2, 3]);
        assert_eq!(idx("1:3", 5), vec![1, 2]);
        assert_eq!(idx("-2:", 5), vec![3, 4]);
        assert_eq!(idx("::2", 5), vec![0, 2, 4]);
        assert_eq!(idx("::-1", 3), vec![2, 1, 0]);
        assert_eq!(idx("3:0:-2", 5), vec![3, 1]);
        assert_eq!(idx("2:100", 4), vec![2, 3]);
        assert_eq!(idx("-1", 4), vec![3]);
        assert_eq!(idx("5:2", 8), Vec::<usize>::new());
    }

    #[test]
    fn zero_step_and_garbage_are_rejected() {
        assert_eq!("1:2:0".parse::<AxisSlice>().unwrap_err().code(), "slice_step");
        assert_eq!("a:2".parse::<AxisSlice>().unwrap_err().code(), "slice_parse");
        assert_eq!("1:2:3:4".parse::<AxisSlice>().unwrap_err().code(), "slice_parse");
    }

    #[test]
    fn bare_index_at_i64_max_is_rejected() {
        let err = i64::MAX.to_string().parse::<AxisSlice>().unwrap_err();
        assert_eq!(err.code(), "slice_bound");
        assert_eq!(
            idx(&(i64::MAX - 1).to_string(), 3),
            Vec::<usize>::new()
        );
    }
}
