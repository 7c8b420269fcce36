//! Positional agreement: centre-of-gravity and Hausdorff distances

use super::{ensure_same_shape, finite};
use crate::structs::{ConcordError, Result};
use ndarray::{ArrayBase, Data, Dimension, Ix2};

/// Mean voxel-index coordinate of all nonzero entries
#[allow(clippy::cast_precision_loss)]
fn centroid<S, D>(array: &ArrayBase<S, D>) -> Option<Vec<f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut sums = vec![0.0; array.ndim()];
    let mut count = 0usize;

    for (index, value) in array.view().into_dyn().indexed_iter() {
        if *value != 0.0 {
            for (sum, &i) in sums.iter_mut().zip(index.slice()) {
                *sum += i as f64;
            }
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    Some(sums.into_iter().map(|s| s / count as f64).collect())
}

/// Euclidean distance between the centres of gravity of `a` and `b`
///
/// # Errors
/// `Precondition` on shape mismatch, `EmptyInput` when either array has no
/// nonzero voxel
pub fn centroid_distance<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("centroid_distance", a, b)?;

    let ca = centroid(a).ok_or_else(|| {
        ConcordError::EmptyInput("centroid_distance: first array has no nonzero voxels".into())
    })?;
    let cb = centroid(b).ok_or_else(|| {
        ConcordError::EmptyInput("centroid_distance: second array has no nonzero voxels".into())
    })?;

    let distance = ca
        .iter()
        .zip(cb.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt();

    finite("centroid_distance", distance)
}

/// Directed Hausdorff distance from the rows of `a` to the rows of `b`
///
/// `max over a_i of min over b_j of ||a_i - b_j||`. The row counts may differ,
/// the column counts may not.
///
/// # Errors
/// `Precondition` when the point dimensions differ, `EmptyInput` when either
/// set has no points
pub fn hausdorff<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    if a.ncols() != b.ncols() {
        return Err(ConcordError::Precondition(format!(
            "hausdorff: point dimension {} does not match {}",
            a.ncols(),
            b.ncols()
        )));
    }
    if a.nrows() == 0 || b.nrows() == 0 {
        return Err(ConcordError::EmptyInput(
            "hausdorff: point set is empty".into(),
        ));
    }

    let mut max_min = 0.0f64;
    for p in a.rows() {
        let nearest = b
            .rows()
            .into_iter()
            .map(|q| {
                p.iter()
                    .zip(q.iter())
                    .map(|(x, y)| (x - y).powi(2))
                    .sum::<f64>()
            })
            .fold(f64::INFINITY, f64::min);
        max_min = max_min.max(nearest);
    }

    finite("hausdorff", max_min.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array3};

    #[test]
    fn test_centroid_identical_cubes() {
        let mut a = Array3::<f64>::zeros((10, 10, 10));
        a.slice_mut(s![0..5, 0..5, 0..5]).fill(1.0);
        let b = a.clone();
        assert!(centroid_distance(&a, &b).expect("centroid").abs() < 1e-12);
    }

    #[test]
    fn test_centroid_shifted_voxel() {
        let mut a = Array3::<f64>::zeros((4, 4, 4));
        let mut b = Array3::<f64>::zeros((4, 4, 4));
        a[[0, 0, 0]] = 1.0;
        b[[0, 3, 3]] = 5.0;
        let expected = (18.0f64).sqrt();
        assert!((centroid_distance(&a, &b).expect("centroid") - expected).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_empty() {
        let a = Array3::<f64>::zeros((2, 2, 2));
        let mut b = Array3::<f64>::zeros((2, 2, 2));
        b[[1, 1, 1]] = 1.0;
        assert!(matches!(
            centroid_distance(&a, &b),
            Err(ConcordError::EmptyInput(_))
        ));
        assert!(matches!(
            centroid_distance(&b, &a),
            Err(ConcordError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_hausdorff_directed() {
        let a = array![[0.0, 0.0], [0.0, 4.0]];
        let b = array![[0.0, 0.0]];
        assert!((hausdorff(&a, &b).expect("hausdorff") - 4.0).abs() < 1e-12);
        assert!(hausdorff(&b, &a).expect("hausdorff").abs() < 1e-12);
    }

    #[test]
    fn test_hausdorff_dimension_mismatch() {
        let a = array![[0.0, 0.0]];
        let b = array![[0.0, 0.0, 0.0]];
        assert!(matches!(
            hausdorff(&a, &b),
            Err(ConcordError::Precondition(_))
        ));
    }
}
