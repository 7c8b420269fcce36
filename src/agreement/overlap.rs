//! Binary overlap measures

use super::{ensure_same_shape, finite};
use crate::structs::{ConcordError, Result};
use ndarray::{Array, ArrayBase, Data, Dimension};
use tracing::warn;

/// Set every nonzero entry (NaN included) to 1.0
#[must_use]
pub fn binarize<S, D>(array: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    array.mapv(|v| if v == 0.0 { 0.0 } else { 1.0 })
}

/// Weighted Dice coefficient, 1.0 = perfect overlap
///
/// `2 * sum(pred where gt == 1) / (sum(pred) + sum(gt))`
///
/// # Errors
/// `Precondition` on shape mismatch, `EmptyInput` when both arrays sum to zero
#[allow(clippy::float_cmp)]
pub fn dice<S1, S2, D>(gt: &ArrayBase<S1, D>, pred: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("dice", gt, pred)?;

    let overlap: f64 = gt
        .iter()
        .zip(pred.iter())
        .filter(|(g, _)| **g == 1.0)
        .map(|(_, p)| *p)
        .sum();
    let denominator = pred.sum() + gt.sum();

    if denominator == 0.0 {
        return Err(ConcordError::EmptyInput(
            "dice: both arrays sum to zero".into(),
        ));
    }

    finite("dice", 2.0 * overlap / denominator)
}

/// Binary Jaccard index over flattened, boolean-coerced inputs
///
/// Two empty masks have no union; the score is then 0.0.
///
/// # Errors
/// `Precondition` on shape mismatch
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("jaccard", a, b)?;

    let mut intersection = 0usize;
    let mut union = 0usize;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x != 0.0, *y != 0.0);
        if x && y {
            intersection += 1;
        }
        if x || y {
            union += 1;
        }
    }

    if union == 0 {
        warn!("jaccard: both masks are empty, scoring 0.0");
        return Ok(0.0);
    }

    Ok(intersection as f64 / union as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array3};
    use proptest::prelude::*;

    fn cube() -> Array3<f64> {
        let mut volume = Array3::<f64>::zeros((10, 10, 10));
        volume.slice_mut(s![0..5, 0..5, 0..5]).fill(1.0);
        volume
    }

    #[test]
    fn test_identical_cubes() {
        let a = cube();
        let b = cube();

        assert!((dice(&a, &b).expect("dice") - 1.0).abs() < 1e-12);
        assert!((jaccard(&a, &b).expect("jaccard") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dice_partial_overlap() {
        let gt = array![1.0, 1.0, 0.0, 0.0];
        let pred = array![1.0, 0.0, 1.0, 0.0];
        // 2 * 1 / (2 + 2)
        assert!((dice(&gt, &pred).expect("dice") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_dice_is_weighted_by_prediction() {
        let gt = array![1.0, 1.0, 0.0];
        let pred = array![0.5, 0.5, 0.0];
        // 2 * 1.0 / (1.0 + 2.0)
        assert!((dice(&gt, &pred).expect("dice") - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_dice_empty() {
        let a = Array3::<f64>::zeros((2, 2, 2));
        let err = dice(&a, &a).expect_err("zero denominator");
        assert!(matches!(err, ConcordError::EmptyInput(_)));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array3::<f64>::zeros((2, 2, 2));
        let b = Array3::<f64>::zeros((2, 2, 3));
        assert!(matches!(
            dice(&a, &b),
            Err(ConcordError::Precondition(_))
        ));
        assert!(matches!(
            jaccard(&a, &b),
            Err(ConcordError::Precondition(_))
        ));
    }

    #[test]
    fn test_jaccard_coerces_labels() {
        let a = array![[3.0, 0.0], [7.0, 1.0]];
        let b = array![[1.0, 2.0], [0.0, 1.0]];
        // intersection {0, 3}, union {0, 1, 2, 3}
        assert!((jaccard(&a, &b).expect("jaccard") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_empty_masks() {
        let a = array![0.0, 0.0];
        assert!(jaccard(&a, &a).expect("jaccard").abs() < 1e-12);
    }

    #[test]
    fn test_binarize() {
        let a = array![0.0, 2.5, -1.0, f64::NAN];
        assert_eq!(binarize(&a), array![0.0, 1.0, 1.0, 1.0]);
    }

    proptest! {
        #[test]
        fn prop_jaccard_symmetric(
            pairs in prop::collection::vec((0u8..3, 0u8..3), 1..64)
        ) {
            let a: ndarray::Array1<f64> = pairs.iter().map(|(x, _)| f64::from(*x)).collect();
            let b: ndarray::Array1<f64> = pairs.iter().map(|(_, y)| f64::from(*y)).collect();
            let ab = jaccard(&a, &b).expect("jaccard");
            let ba = jaccard(&b, &a).expect("jaccard");
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&ab));
        }

        #[test]
        fn prop_dice_self_is_one(
            bits in prop::collection::vec(any::<bool>(), 1..64)
        ) {
            let a: ndarray::Array1<f64> = bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
            prop_assume!(a.sum() > 0.0);
            prop_assert!((dice(&a, &a).expect("dice") - 1.0).abs() < 1e-12);
        }
    }
}
