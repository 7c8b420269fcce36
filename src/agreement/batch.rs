//! Agreement batches over paired subjects

use super::binarize;
use super::parcellation::roi_agreement;
use crate::pool::{BatchConfig, WorkerPool};
use crate::registry::agreement_registry;
use crate::structs::{
    AgreementTable, ConcordError, ItemFailure, Result, RoiAgreementTable, SubjectRecord,
};
use ndarray::Array2;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// Subjects present in both groups, in the order of the first group
///
/// # Errors
/// Returns `Precondition` naming every identifier present in only one group
pub fn match_subjects<S: AsRef<str>>(first: &[S], second: &[S]) -> Result<Vec<String>> {
    let a: BTreeSet<&str> = first.iter().map(AsRef::as_ref).collect();
    let b: BTreeSet<&str> = second.iter().map(AsRef::as_ref).collect();

    if a.is_empty() && b.is_empty() {
        return Err(ConcordError::Precondition("no subjects in either group".into()));
    }

    let only_first: Vec<&str> = a.difference(&b).copied().collect();
    let only_second: Vec<&str> = b.difference(&a).copied().collect();
    if !only_first.is_empty() || !only_second.is_empty() {
        return Err(ConcordError::Precondition(format!(
            "unequal subjects in both groups; only in first: [{}]; only in second: [{}]",
            only_first.join(", "),
            only_second.join(", ")
        )));
    }

    let mut seen = HashSet::new();
    Ok(first
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect())
}

/// Every record must pair arrays of one shape
///
/// # Errors
/// Returns a single `Precondition` listing every mismatched subject
pub fn validate_records(records: &[SubjectRecord]) -> Result<()> {
    let mismatched: Vec<String> = records
        .iter()
        .filter_map(|r| r.validate().err().map(|e| e.to_string()))
        .collect();

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(ConcordError::Precondition(mismatched.join("; ")))
    }
}

/// Label volumes (more than two distinct values in the first record) are
/// compared as whole-brain masks
#[must_use]
pub fn needs_binarization(records: &[SubjectRecord]) -> bool {
    let Some(first) = records.first() else {
        return false;
    };
    let mut distinct: Vec<f64> = Vec::new();
    for v in &first.first {
        if !distinct.iter().any(|d| d.to_bits() == v.to_bits()) {
            distinct.push(*v);
            if distinct.len() > 2 {
                return true;
            }
        }
    }
    false
}

/// Binarized copies of every record
#[must_use]
pub fn binarize_records(records: &[SubjectRecord]) -> Vec<SubjectRecord> {
    records
        .iter()
        .map(|r| SubjectRecord::new(r.id.clone(), binarize(&r.first), binarize(&r.second)))
        .collect()
}

/// Mask mode: label volumes are binarized, binary masks pass through
#[must_use]
pub fn normalize_masks(records: Vec<SubjectRecord>) -> Vec<SubjectRecord> {
    if needs_binarization(&records) {
        info!("label volumes detected, comparing whole-brain masks");
        binarize_records(&records)
    } else {
        records
    }
}

/// Compute every requested metric for every subject
///
/// Metric names are resolved and shapes validated before any work starts;
/// both failures abort the batch. Per-subject failures leave NaN in their
/// cell and are listed in `failures`.
///
/// # Errors
/// `UnknownMetric`, `Config` or `Precondition` for batch-level problems
pub fn run_agreement<N: AsRef<str>>(
    records: &[SubjectRecord],
    metrics: &[N],
    config: &BatchConfig,
) -> Result<AgreementTable> {
    let selected = agreement_registry().select(metrics)?;
    validate_records(records)?;

    let metric_names: Vec<String> = selected.iter().map(|(n, _)| n.clone()).collect();
    info!(
        subjects = records.len(),
        metrics = %metric_names.join(","),
        "START: computing agreement measures"
    );

    let pool = WorkerPool::new(config)?;
    let outcomes = pool.run(records, |_, record| {
        Ok(selected
            .iter()
            .map(|(_, metric)| metric(record.first.view(), record.second.view()))
            .collect::<Vec<_>>())
    });
    drop(pool);

    let mut values = Array2::from_elem((records.len(), selected.len()), f64::NAN);
    let mut failures = Vec::new();

    for (row, (record, outcome)) in records.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(scores) => {
                for (col, (score, name)) in scores.into_iter().zip(&metric_names).enumerate() {
                    match score {
                        Ok(v) => values[[row, col]] = v,
                        Err(e) => {
                            warn!(index = row, subject = %record.id, metric = %name, "agreement failed: {e}");
                            failures.push(ItemFailure::new(row, &record.id, Some(name), &e));
                        }
                    }
                }
            }
            Err(e) => {
                warn!(index = row, subject = %record.id, "agreement task failed: {e}");
                failures.push(ItemFailure::new(row, &record.id, None, &e));
            }
        }
    }

    info!(failures = failures.len(), "FINISHED: computing agreement measures");

    Ok(AgreementTable {
        metrics: metric_names,
        subjects: records.iter().map(|r| r.id.clone()).collect(),
        values,
        failures,
    })
}

/// Per-ROI agreement of label parcellations, one table per metric
///
/// Columns are the union of the reference labels across subjects; a label
/// missing from a subject's reference parcellation stays NaN.
///
/// # Errors
/// `UnknownMetric`, `Config` or `Precondition` for batch-level problems
pub fn run_parcellation<N: AsRef<str>>(
    records: &[SubjectRecord],
    metrics: &[N],
    config: &BatchConfig,
) -> Result<Vec<RoiAgreementTable>> {
    let selected = agreement_registry().select(metrics)?;
    validate_records(records)?;

    info!(subjects = records.len(), "START: computing parcellation agreement measures");

    let pool = WorkerPool::new(config)?;
    let outcomes = pool.run(records, |_, record| {
        roi_agreement(&record.first.view(), &record.second.view(), &selected)
    });
    drop(pool);

    let rois: Vec<i64> = outcomes
        .iter()
        .filter_map(|o| o.as_ref().ok())
        .flat_map(|s| s.rois.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut tables: Vec<RoiAgreementTable> = selected
        .iter()
        .map(|(name, _)| RoiAgreementTable {
            metric: name.clone(),
            subjects: records.iter().map(|r| r.id.clone()).collect(),
            rois: rois.clone(),
            values: Array2::from_elem((records.len(), rois.len()), f64::NAN),
            failures: Vec::new(),
        })
        .collect();

    for (row, (record, outcome)) in records.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(scores) => {
                for (table, metric_scores) in tables.iter_mut().zip(scores.scores) {
                    for (roi, score) in scores.rois.iter().zip(metric_scores) {
                        let Ok(col) = rois.binary_search(roi) else {
                            continue;
                        };
                        match score {
                            Ok(v) => table.values[[row, col]] = v,
                            Err(e) => {
                                let label = format!("{}:roi_{roi}", table.metric);
                                warn!(index = row, subject = %record.id, metric = %label, "agreement failed: {e}");
                                table.failures.push(ItemFailure::new(row, &record.id, Some(&label), &e));
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(index = row, subject = %record.id, "parcellation task failed: {e}");
                for table in &mut tables {
                    table.failures.push(ItemFailure::new(row, &record.id, None, &e));
                }
            }
        }
    }

    info!("FINISHED: computing parcellation agreement measures");
    Ok(tables)
}
