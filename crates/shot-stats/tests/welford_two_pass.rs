use proptest::prelude::*;
use shot_core::NdArray;
use shot_stats::{accumulate, MomentSums, SampleFilter};

fn two_pass(x: &[Vec<f64>], y: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>, Vec<Vec<f64>>) {
    let n = x.len() as f64;
    let dx = x[0].len();
    let dy = y[0].len();
    let mean_x: Vec<f64> = (0..dx).map(|i| x.iter().map(|r| r[i]).sum::<f64>() / n).collect();
    let mean_y: Vec<f64> = (0..dy).map(|j| y.iter().map(|r| r[j]).sum::<f64>() / n).collect();
    let mut cov = vec![vec![0.0; dy]; dx];
    for (rx, ry) in x.iter().zip(y) {
        for i in 0..dx {
            for j in 0..dy {
                cov[i][j] += (rx[i] - mean_x[i]) * (ry[j] - mean_y[j]);
            }
        }
    }
    (mean_x, mean_y, cov)
}

fn rows(values: &[Vec<f64>]) -> NdArray {
    let width = values[0].len();
    NdArray::new(
        vec![values.len(), width],
        values.iter().flatten().copied().collect(),
    )
    .unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-7 * (1.0 + a.abs().max(b.abs()))
}

proptest! {
    #[test]
    fn welford_matches_two_pass(
        x in prop::collection::vec(prop::collection::vec(-50.0f64..50.0, 3), 1..30),
        seed in prop::collection::vec(-50.0f64..50.0, 60),
        weight in 0.5f64..3.0,
    ) {
        let y: Vec<Vec<f64>> = x.iter().enumerate().map(|(i, _)| vec![seed[2 * i], seed[2 * i + 1]]).collect();
        let sums = accumulate(&rows(&x), Some(&rows(&y)), None, None, weight).unwrap();
        let (mean_x, mean_y, cov) = two_pass(&x, &y);
        prop_assert!(close(sums.count, x.len() as f64 * weight));
        for i in 0..3 {
            prop_assert!(close(sums.mean_1()[i], mean_x[i]));
            for j in 0..2 {
                prop_assert!(close(sums.covariance_sum[(i, j)], cov[i][j] * weight));
            }
        }
        for j in 0..2 {
            prop_assert!(close(sums.mean_2()[j], mean_y[j]));
        }
    }

    #[test]
    fn chan_merge_matches_single_pass(
        x in prop::collection::vec(prop::collection::vec(-20.0f64..20.0, 2), 2..40),
        split in 0usize..40,
    ) {
        let split = split % x.len();
        let whole = accumulate(&rows(&x), None, None, None, 1.0).unwrap();
        let left = if split == 0 {
            MomentSums::zeros(2, 2)
        } else {
            accumulate(&rows(&x[..split]), None, None, None, 1.0).unwrap()
        };
        let right = accumulate(&rows(&x[split..]), None, None, None, 1.0).unwrap();
        let merged = left.merge(&right).unwrap();
        prop_assert!(close(merged.count, whole.count));
        for i in 0..2 {
            prop_assert!(close(merged.sum_1[i], whole.sum_1[i]));
            for j in 0..2 {
                prop_assert!(close(merged.covariance_sum[(i, j)], whole.covariance_sum[(i, j)]));
            }
        }
    }
}

#[test]
fn self_covariance_filters_are_independent() {
    let samples = rows(&[vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 7.0], vec![0.0, 1.0, 1.0]]);
    let select = SampleFilter::Select { indices: vec![2] };
    let sums = accumulate(&samples, None, Some(&select), None, 1.0).unwrap();
    assert_eq!(sums.dims(), (1, 3));
    assert!(close(sums.sum_1[0], 11.0));
    assert!(close(sums.sum_2[1], 7.0));

    let ranges = SampleFilter::RangeSums {
        ranges: vec![(0, 2), (1, 3)],
    };
    let summed = accumulate(&samples, None, Some(&ranges), Some(&ranges), 1.0).unwrap();
    assert_eq!(summed.dims(), (2, 2));
    assert!(close(summed.sum_1[0], 3.0 + 6.0 + 1.0));
    assert!(close(summed.covariance_sum[(0, 1)], summed.covariance_sum[(1, 0)]));
}

#[test]
fn empty_input_yields_zero_sums() {
    let empty = NdArray::zeros(&[0, 4]);
    let sums = accumulate(&empty, None, None, None, 2.0).unwrap();
    assert_eq!(sums.count, 0.0);
    assert_eq!(sums.dims(), (4, 4));
    assert_eq!(sums.covariance(), nalgebra::DMatrix::<f64>::zeros(4, 4));
}

#[test]
fn mismatched_streams_and_filters_are_errors() {
    let a = rows(&[vec![1.0], vec![2.0]]);
    let b = rows(&[vec![1.0]]);
    assert_eq!(
        accumulate(&a, Some(&b), None, None, 1.0).unwrap_err().code(),
        "sample_count"
    );
    let bad = SampleFilter::Select { indices: vec![4] };
    assert_eq!(
        accumulate(&a, None, Some(&bad), None, 1.0).unwrap_err().code(),
        "filter_bounds"
    );
    assert_eq!(
        MomentSums::zeros(1, 1)
            .merge(&MomentSums::zeros(2, 2))
            .unwrap_err()
            .code(),
        "moment_dims"
    );
}
