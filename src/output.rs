//! Result table and batch summary writers
//!
//! Every table is a comma-separated file with a single header line; failed
//! cells are written as `NaN`.

use crate::structs::{
    AgreementTable, ClassificationReport, GlobalMetricsTable, ItemFailure, LocalMetricsTable,
    Result, RoiAgreementTable,
};
use csv::Writer;
use ndarray::Array2;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `header` then one `id,values...` line per row
fn write_rows<I: AsRef<str>>(
    path: &Path,
    header: &[String],
    ids: &[I],
    values: &Array2<f64>,
) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(header)?;
    for (id, row) in ids.iter().zip(values.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(id.as_ref().to_string());
        record.extend(row.iter().map(ToString::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn with_first(first: &str, rest: impl IntoIterator<Item = String>) -> Vec<String> {
    std::iter::once(first.to_string()).chain(rest).collect()
}

/// Column names `ROI_1..ROI_n`
#[must_use]
pub fn roi_header(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("ROI_{i}")).collect()
}

/// Write the subjects x metrics agreement table
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_agreement_table(path: &Path, table: &AgreementTable) -> Result<()> {
    let header = with_first("subject", table.metrics.iter().cloned());
    write_rows(path, &header, &table.subjects, &table.values)
}

/// Write one `<metric>_roi.csv` per parcellation metric into `dir`
///
/// # Errors
/// Returns error if any file cannot be written
pub fn write_roi_tables(dir: &Path, tables: &[RoiAgreementTable]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(format!("{}_roi.csv", table.metric));
        let header = with_first("subject", table.rois.iter().map(|r| format!("ROI_{r}")));
        write_rows(&path, &header, &table.subjects, &table.values)?;
        written.push(path);
    }
    Ok(written)
}

/// Write the subjects x global-metric table
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_global_table(path: &Path, table: &GlobalMetricsTable) -> Result<()> {
    let header = with_first("subject", table.metrics.iter().cloned());
    write_rows(path, &header, &table.subjects, &table.values)
}

/// Write one `<metric>_local.csv` per local metric into `dir`
///
/// # Errors
/// Returns error if any file cannot be written
pub fn write_local_tables(dir: &Path, tables: &[LocalMetricsTable]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(format!("{}_local.csv", table.metric));
        let header = with_first("subject", roi_header(table.values.ncols()));
        write_rows(&path, &header, &table.subjects, &table.values)?;
        written.push(path);
    }
    Ok(written)
}

/// Write `run,accuracy` for every successful run
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_accuracy(path: &Path, report: &ClassificationReport) -> Result<()> {
    let ids: Vec<String> = report.runs.iter().map(ToString::to_string).collect();
    let values = report.accuracy.clone().insert_axis(ndarray::Axis(1));
    write_rows(path, &["run".to_string(), "accuracy".to_string()], &ids, &values)
}

/// Write the runs x features importance matrix
///
/// Columns use `feature_names` when given, `feature_1..` otherwise.
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_importance(
    path: &Path,
    report: &ClassificationReport,
    feature_names: Option<&[String]>,
) -> Result<()> {
    let names: Vec<String> = match feature_names {
        Some(names) if names.len() == report.importance.ncols() => names.to_vec(),
        _ => (1..=report.importance.ncols())
            .map(|i| format!("feature_{i}"))
            .collect(),
    };
    let ids: Vec<String> = report.runs.iter().map(ToString::to_string).collect();
    write_rows(path, &with_first("run", names), &ids, &report.importance)
}

/// Machine-readable overview of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub analysis: String,
    pub items: usize,
    pub succeeded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_accuracy: Option<f64>,
    pub failures: Vec<ItemFailure>,
}

impl BatchSummary {
    /// Summary of a subject batch; a subject counts as succeeded when it has
    /// no failure entry
    #[must_use]
    pub fn for_subjects(
        analysis: &str,
        items: usize,
        seed: Option<u64>,
        failures: Vec<ItemFailure>,
    ) -> Self {
        let failed: std::collections::BTreeSet<usize> =
            failures.iter().map(|f| f.index).collect();
        Self {
            analysis: analysis.to_string(),
            items,
            succeeded: items - failed.len().min(items),
            seed,
            mean_accuracy: None,
            failures,
        }
    }

    #[must_use]
    pub fn for_classification(report: &ClassificationReport) -> Self {
        Self {
            analysis: "classification".to_string(),
            items: report.runs.len() + report.failures.len(),
            succeeded: report.runs.len(),
            seed: Some(report.seed),
            mean_accuracy: report.mean_accuracy(),
            failures: report.failures.clone(),
        }
    }
}

/// Write `summary.json`
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary_json(output_dir: &Path, summary: &BatchSummary) -> Result<PathBuf> {
    let path = output_dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::ConcordError;
    use ndarray::array;
    use tempfile::TempDir;

    fn report() -> ClassificationReport {
        ClassificationReport {
            runs: vec![0, 2],
            accuracy: array![1.0, 0.5],
            importance: array![[0.25, 0.75], [0.5, 0.5]],
            failures: vec![ItemFailure::new(
                1,
                "run_1",
                None,
                &ConcordError::DegenerateSplit {
                    run: 1,
                    detail: "class 1 absent from test".into(),
                },
            )],
            seed: 99,
        }
    }

    #[test]
    fn test_agreement_table_layout() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("agreement.csv");
        let table = AgreementTable {
            metrics: vec!["dice".into(), "jaccard".into()],
            subjects: vec!["sub-01".into(), "sub-02".into()],
            values: array![[1.0, 1.0], [0.5, f64::NAN]],
            failures: Vec::new(),
        };
        write_agreement_table(&path, &table).expect("write");

        let content = fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "subject,dice,jaccard");
        assert_eq!(lines[1], "sub-01,1,1");
        assert_eq!(lines[2], "sub-02,0.5,NaN");
    }

    #[test]
    fn test_local_tables_use_roi_header() {
        let dir = TempDir::new().expect("temp dir");
        let tables = vec![LocalMetricsTable {
            metric: "degree".into(),
            subjects: vec!["s1".into()],
            values: array![[3.0, 3.0, 3.0]],
            failures: Vec::new(),
        }];
        let written = write_local_tables(dir.path(), &tables).expect("write");

        assert_eq!(written[0].file_name().and_then(|n| n.to_str()), Some("degree_local.csv"));
        let content = fs::read_to_string(&written[0]).expect("read");
        assert!(content.starts_with("subject,ROI_1,ROI_2,ROI_3\n"));
    }

    #[test]
    fn test_classification_outputs() {
        let dir = TempDir::new().expect("temp dir");
        let report = report();

        let acc = dir.path().join("accuracy.csv");
        write_accuracy(&acc, &report).expect("write");
        let content = fs::read_to_string(&acc).expect("read");
        assert_eq!(content, "run,accuracy\n0,1\n2,0.5\n");

        let imp = dir.path().join("importance.csv");
        write_importance(&imp, &report, None).expect("write");
        let content = fs::read_to_string(&imp).expect("read");
        assert!(content.starts_with("run,feature_1,feature_2\n0,0.25,0.75\n"));
    }

    #[test]
    fn test_summary_json() {
        let dir = TempDir::new().expect("temp dir");
        let summary = BatchSummary::for_classification(&report());
        let path = write_summary_json(dir.path(), &summary).expect("write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(value["items"], 3);
        assert_eq!(value["succeeded"], 2);
        assert_eq!(value["seed"], 99);
        assert_eq!(value["failures"][0]["kind"], "degenerate_split");
        assert!(value["failures"][0].get("metric").is_none());
    }

    #[test]
    fn test_subject_summary_counts_failed_subjects_once() {
        let err = ConcordError::EmptyInput("x".into());
        let failures = vec![
            ItemFailure::new(1, "b", Some("dice"), &err),
            ItemFailure::new(1, "b", Some("jaccard"), &err),
        ];
        let summary = BatchSummary::for_subjects("agreement", 3, None, failures);
        assert_eq!(summary.succeeded, 2);
    }
}
