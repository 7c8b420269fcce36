//! Signal agreement: correlation, distances and volume differences

use super::{ensure_same_shape, finite};
use crate::structs::{ConcordError, Result};
use ndarray::{Array, Array1, ArrayBase, ArrayView, Axis, Data, Dimension, Ix2, Slice, Zip};

/// Upper triangle (diagonal included) of a square matrix, row-major
///
/// # Errors
/// Returns `Precondition` if the matrix is not square
pub fn vectorize<S>(matrix: &ArrayBase<S, Ix2>) -> Result<Array1<f64>>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(ConcordError::Precondition(format!(
            "vectorize: matrix is {rows}x{cols}, expected square"
        )));
    }

    let mut values = Vec::with_capacity(rows * (rows + 1) / 2);
    for i in 0..rows {
        for j in i..cols {
            values.push(matrix[[i, j]]);
        }
    }
    Ok(Array1::from(values))
}

/// `(sum(a) - sum(b)) / sum(a)`, with `a` as the reference volume
///
/// # Errors
/// `Precondition` on shape mismatch, `EmptyInput` when `sum(a) == 0`
pub fn volume_difference<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("volume_difference", a, b)?;

    let reference = a.sum();
    if reference == 0.0 {
        return Err(ConcordError::EmptyInput(
            "volume_difference: reference volume is empty".into(),
        ));
    }

    finite("volume_difference", (reference - b.sum()) / reference)
}

/// Drop the leading label entry along the last axis (`a[..., 1:]`)
fn strip_label<'a, S, D>(metric: &str, a: &'a ArrayBase<S, D>) -> Result<ArrayView<'a, f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if a.ndim() == 0 {
        return Err(ConcordError::Precondition(format!(
            "{metric}: scalar input has no label column"
        )));
    }
    let last = Axis(a.ndim() - 1);
    if a.len_of(last) == 0 {
        return Err(ConcordError::EmptyInput(format!(
            "{metric}: input has no entries"
        )));
    }
    Ok(a.slice_axis(last, Slice::from(1_usize..)))
}

/// L2 norm of `a[..., 1:] - b[..., 1:]`; the first entry is a label
///
/// # Errors
/// `Precondition` on shape mismatch or scalar input
pub fn euclid_distance<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("euclid_distance", a, b)?;
    let a = strip_label("euclid_distance", a)?;
    let b = strip_label("euclid_distance", b)?;

    let squared: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum();

    finite("euclid_distance", squared.sqrt())
}

/// Elementwise `a[..., 1:] - b[..., 1:]`, e.g. ROI size deltas
///
/// # Errors
/// `Precondition` on shape mismatch or scalar input
pub fn difference<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<Array<f64, D>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("difference", a, b)?;
    let a = strip_label("difference", a)?;
    let b = strip_label("difference", b)?;
    Ok(Zip::from(&a).and(&b).map_collect(|x, y| x - y))
}

/// Pearson correlation
///
/// 2-D inputs must be square; their upper triangles (diagonal included) are
/// correlated. 1-D inputs are correlated directly.
///
/// # Errors
/// `Precondition` on shape mismatch or unsupported rank,
/// `Computation` when either input is constant
pub fn pearson<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    ensure_same_shape("pearson", a, b)?;

    let (x, y) = match a.ndim() {
        1 => (
            a.iter().copied().collect::<Vec<f64>>(),
            b.iter().copied().collect::<Vec<f64>>(),
        ),
        2 => {
            let a2 = a.view().into_dimensionality::<Ix2>().map_err(|e| {
                ConcordError::Precondition(format!("pearson: {e}"))
            })?;
            let b2 = b.view().into_dimensionality::<Ix2>().map_err(|e| {
                ConcordError::Precondition(format!("pearson: {e}"))
            })?;
            (vectorize(&a2)?.to_vec(), vectorize(&b2)?.to_vec())
        }
        n => {
            return Err(ConcordError::Precondition(format!(
                "pearson: expected 1-D or 2-D input, got {n}-D"
            )))
        }
    };

    correlation(&x, &y)
}

/// Calculate correlation coefficient between two variables
///
/// # Errors
/// Returns error if vectors have different lengths, fewer than 2 values,
/// or zero variance
#[allow(clippy::cast_precision_loss)]
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(ConcordError::Precondition(
            "correlation: vectors must have same length".into(),
        ));
    }
    if x.len() < 2 {
        return Err(ConcordError::EmptyInput(
            "correlation: need at least 2 values".into(),
        ));
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return Err(ConcordError::Computation(
            "correlation: input is constant".into(),
        ));
    }

    finite("pearson", cov / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_vectorize_upper_triangle() {
        let m = array![[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]];
        assert_eq!(
            vectorize(&m).expect("vectorize"),
            array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert!(vectorize(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_volume_difference() {
        let a = array![1.0, 1.0, 1.0, 1.0];
        let b = array![1.0, 1.0, 0.0, 0.0];
        assert!((volume_difference(&a, &b).expect("vd") - 0.5).abs() < 1e-12);
        assert!((volume_difference(&b, &a).expect("vd") + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_difference_self_is_zero() {
        let mut a = Array3::<f64>::zeros((3, 3, 3));
        a[[1, 1, 1]] = 1.0;
        a[[0, 2, 1]] = 1.0;
        assert!(volume_difference(&a, &a).expect("vd").abs() < 1e-12);
    }

    #[test]
    fn test_volume_difference_empty_reference() {
        let a = array![0.0, 0.0];
        let b = array![1.0, 0.0];
        assert!(matches!(
            volume_difference(&a, &b),
            Err(ConcordError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_euclid_skips_label_column() {
        let a = array![[1.0, 3.0, 0.0], [2.0, 0.0, 0.0]];
        let b = array![[9.0, 0.0, 4.0], [8.0, 0.0, 0.0]];
        assert!((euclid_distance(&a, &b).expect("euclid") - 5.0).abs() < 1e-12);

        let v1 = array![100.0, 3.0, 4.0];
        let v2 = array![-5.0, 0.0, 0.0];
        assert!((euclid_distance(&v1, &v2).expect("euclid") - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_difference() {
        let a = array![[1.0, 10.0, 20.0]];
        let b = array![[1.0, 4.0, 25.0]];
        assert_eq!(difference(&a, &b).expect("diff"), array![[6.0, -5.0]]);
    }

    #[test]
    fn test_pearson_vectors() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&x, &y).expect("pearson") - 1.0).abs() < 1e-12);

        let z = array![5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &z).expect("pearson") + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_matrices_use_upper_triangle() {
        let a = array![[1.0, 2.0], [100.0, 3.0]];
        let b = array![[2.0, 4.0], [-7.0, 6.0]];
        // lower triangle differs wildly but is ignored
        assert!((pearson(&a, &b).expect("pearson") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_constant_input() {
        let x = array![1.0, 1.0, 1.0];
        let y = array![1.0, 2.0, 3.0];
        assert!(matches!(
            pearson(&x, &y),
            Err(ConcordError::Computation(_))
        ));
    }

    #[test]
    fn test_pearson_rejects_volumes() {
        let a = Array3::<f64>::ones((2, 2, 2));
        assert!(matches!(
            pearson(&a, &a),
            Err(ConcordError::Precondition(_))
        ));
    }
}
