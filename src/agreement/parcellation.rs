//! Per-ROI agreement between two label parcellations

use super::ensure_same_shape;
use crate::registry::AgreementFn;
use crate::structs::Result;
use ndarray::{ArrayBase, ArrayD, ArrayViewD, Data, Dimension};
use std::collections::BTreeSet;

/// Scores of every reference ROI, one inner vector per metric
#[derive(Debug)]
pub struct RoiScores {
    pub rois: Vec<i64>,
    /// `scores[metric][roi]`
    pub scores: Vec<Vec<Result<f64>>>,
}

/// Sorted distinct nonzero labels of a parcellation
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn roi_labels<S, D>(parcellation: &ArrayBase<S, D>) -> Vec<i64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    parcellation
        .iter()
        .filter(|v| **v != 0.0 && v.is_finite())
        .map(|v| *v as i64)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Binary mask of the voxels carrying `label`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn roi_mask(parcellation: &ArrayViewD<'_, f64>, label: i64) -> ArrayD<f64> {
    parcellation.mapv(|v| {
        if v != 0.0 && v.is_finite() && v as i64 == label {
            1.0
        } else {
            0.0
        }
    })
}

/// Binarize both parcellations on every reference label and score each ROI
///
/// A failing (ROI, metric) pair stays an `Err` in its slot; siblings are
/// unaffected.
///
/// # Errors
/// Returns `Precondition` if the parcellations differ in shape
pub fn roi_agreement(
    reference: &ArrayViewD<'_, f64>,
    other: &ArrayViewD<'_, f64>,
    metrics: &[(String, AgreementFn)],
) -> Result<RoiScores> {
    ensure_same_shape("roi_agreement", reference, other)?;

    let rois = roi_labels(reference);
    let mut scores: Vec<Vec<Result<f64>>> = metrics
        .iter()
        .map(|_| Vec::with_capacity(rois.len()))
        .collect();

    for &roi in &rois {
        let x = roi_mask(reference, roi);
        let y = roi_mask(other, roi);
        for ((_, metric), slot) in metrics.iter().zip(scores.iter_mut()) {
            slot.push(metric(x.view(), y.view()));
        }
    }

    Ok(RoiScores { rois, scores })
}
