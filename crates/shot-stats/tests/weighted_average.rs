use proptest::prelude::*;
use shot_core::NdArray;
use shot_stats::WeightedAverage;

fn average(values: [f64; 4], weights: [f64; 2]) -> WeightedAverage {
    let sums: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, v)| v * weights[i / 2])
        .collect();
    WeightedAverage::from_sums(
        vec![2, 1],
        NdArray::new(vec![2, 1, 2], sums).unwrap(),
        &weights,
    )
    .unwrap()
}

fn assert_close(a: &WeightedAverage, b: &WeightedAverage) {
    assert_eq!(a.average.shape(), b.average.shape());
    for (x, y) in a.average.data().iter().zip(b.average.data()) {
        assert!((x - y).abs() < 1e-9, "{x} vs {y}");
    }
    assert_eq!(a.weights, b.weights);
}

#[test]
fn zero_counts_divide_by_one() {
    let avg = WeightedAverage::from_sums(
        vec![2],
        NdArray::new(vec![2, 2], vec![4.0, 6.0, 0.0, 0.0]).unwrap(),
        &[2.0, 0.0],
    )
    .unwrap();
    assert_eq!(avg.average.data(), &[2.0, 3.0, 0.0, 0.0]);
    assert_eq!(avg.weights.data(), &[2.0, 0.0]);
    assert_eq!(avg.data_shape(), &[2]);

    let both_empty = avg.combine(&avg).unwrap();
    assert_eq!(&both_empty.average.data()[2..], &[0.0, 0.0]);
}

#[test]
fn combine_weights_by_count() {
    let a = average([1.0, 1.0, 5.0, 5.0], [1.0, 2.0]);
    let b = average([3.0, 3.0, 5.0, 5.0], [3.0, 0.0]);
    let c = a.combine(&b).unwrap();
    assert_eq!(c.average.data(), &[2.5, 2.5, 5.0, 5.0]);
    assert_eq!(c.weights.data(), &[4.0, 2.0]);
}

#[test]
fn shape_mismatch_is_rejected() {
    let a = average([1.0; 4], [1.0, 1.0]);
    let b = WeightedAverage::from_sums(vec![2], NdArray::zeros(&[2, 2]), &[1.0, 1.0]).unwrap();
    assert_eq!(a.combine(&b).unwrap_err().code(), "combine_shape");
    assert_eq!(
        WeightedAverage::from_sums(vec![3], NdArray::zeros(&[2, 2]), &[1.0, 1.0])
            .unwrap_err()
            .code(),
        "bucket_shape"
    );
}

#[test]
fn stack_adds_leading_axis_and_fold_handles_empty() {
    let a = average([1.0; 4], [1.0, 1.0]);
    let b = average([2.0; 4], [1.0, 1.0]);
    let stacked = WeightedAverage::stack(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(stacked.average.shape(), &[2, 2, 1, 2]);
    assert_eq!(stacked.weights.shape(), &[2, 2, 1]);
    assert!(WeightedAverage::fold(std::iter::empty()).unwrap().is_none());
    let folded = WeightedAverage::fold([&a, &b]).unwrap().unwrap();
    assert_eq!(folded.average.data(), &[1.5; 4]);
}

fn arb_average() -> impl Strategy<Value = WeightedAverage> {
    (
        prop::array::uniform4(-10.0f64..10.0),
        prop::array::uniform2(0u8..5),
    )
        .prop_map(|(values, counts)| average(values, [f64::from(counts[0]), f64::from(counts[1])]))
}

proptest! {
    #[test]
    fn combination_is_commutative_and_associative(
        a in arb_average(),
        b in arb_average(),
        c in arb_average(),
    ) {
        assert_close(&a.combine(&b).unwrap(), &b.combine(&a).unwrap());
        let left = a.combine(&b).unwrap().combine(&c).unwrap();
        let right = a.combine(&b.combine(&c).unwrap()).unwrap();
        assert_close(&left, &right);
    }
}
