//! Agreement metrics comparing one structure processed under two conditions
//!
//! Binary overlap (`dice`, `jaccard`), signal agreement (`pearson`,
//! `euclid_distance`, `volume_difference`) and positional agreement
//! (`centroid_distance`, `hausdorff`). Every function is pure and takes
//! borrowed arrays.

pub mod batch;
pub mod overlap;
pub mod parcellation;
pub mod position;
pub mod signal;

pub use overlap::{binarize, dice, jaccard};
pub use position::{centroid_distance, hausdorff};
pub use signal::{difference, euclid_distance, pearson, vectorize, volume_difference};

use crate::structs::{ConcordError, Result};
use ndarray::{ArrayBase, Data, Dimension};

/// Paired arrays must share one shape
pub(crate) fn ensure_same_shape<S1, S2, D>(
    metric: &str,
    a: &ArrayBase<S1, D>,
    b: &ArrayBase<S2, D>,
) -> Result<()>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if a.shape() == b.shape() {
        Ok(())
    } else {
        Err(ConcordError::Precondition(format!(
            "{metric}: shape {:?} does not match {:?}",
            a.shape(),
            b.shape()
        )))
    }
}

/// Reject NaN/inf results where a finite scalar is required
pub(crate) fn finite(metric: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConcordError::Computation(format!(
            "{metric} produced a non-finite value ({value})"
        )))
    }
}
