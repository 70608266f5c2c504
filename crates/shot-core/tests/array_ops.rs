use proptest::prelude::*;
use shot_core::NdArray;

#[test]
fn concat_and_stack_shapes() {
    let a = NdArray::new(vec![2, 3], (0..6).map(f64::from).collect()).unwrap();
    let b = NdArray::new(vec![1, 3], vec![6.0, 7.0, 8.0]).unwrap();
    let joined = NdArray::concat_rows(&[a.clone(), b]).unwrap();
    assert_eq!(joined.shape(), &[3, 3]);
    assert_eq!(joined.row(2), &[6.0, 7.0, 8.0]);

    let stacked = NdArray::stack(&[a.clone(), a]).unwrap();
    assert_eq!(stacked.shape(), &[2, 2, 3]);
}

#[test]
fn mismatched_rows_are_rejected() {
    let a = NdArray::zeros(&[2, 3]);
    let b = NdArray::zeros(&[2, 4]);
    let err = NdArray::concat_rows(&[a, b]).unwrap_err();
    assert_eq!(err.code(), "concat_shape");
}

#[test]
fn zero_dimensional_array_has_one_row() {
    let scalar = NdArray::scalar(4.5);
    assert_eq!(scalar.rows(), 1);
    assert_eq!(scalar.row_len(), 1);
    assert_eq!(scalar.row(0), &[4.5]);
}

proptest! {
    #[test]
    fn select_then_sum_matches_manual(values in prop::collection::vec(-100.0f64..100.0, 1..40)) {
        let rows = values.len();
        let array = NdArray::from_vec(values.clone()).reshape(vec![rows, 1]).unwrap();
        let mask: Vec<bool> = (0..rows).map(|index| index % 3 != 0).collect();
        let picked = array.select_rows(&mask).unwrap();
        let expected: f64 = values
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(value, _)| value)
            .sum();
        prop_assert!((picked.sum_rows().data()[0] - expected).abs() < 1e-9);
    }
}
