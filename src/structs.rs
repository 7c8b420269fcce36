//! Consolidated public types for the concord crate
//!
//! This module contains the error taxonomy and every data structure that is
//! passed between the engines and the orchestrating layer.

use ndarray::{Array1, Array2, ArrayD};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ConcordError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] linfa::error::Error),

    /// Shape mismatch or subject-set mismatch. Aborts the whole batch.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Zero denominator or empty reference set for a single item.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Degenerate split in run {run}: {detail}")]
    DegenerateSplit { run: usize, detail: String },

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Unknown metric(s): {0}")]
    UnknownMetric(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConcordError {
    /// Whether this error invalidates the whole batch rather than one item
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_)
                | Self::UnknownMetric(_)
                | Self::Config(_)
                | Self::Io(_)
                | Self::Csv(_)
                | Self::Json(_)
        )
    }

    /// Short machine-readable kind used in batch summaries
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Csv(_) => "csv",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Model(_) => "model",
            Self::Precondition(_) => "precondition",
            Self::EmptyInput(_) => "empty_input",
            Self::DegenerateSplit { .. } => "degenerate_split",
            Self::Computation(_) => "computation",
            Self::UnknownMetric(_) => "unknown_metric",
            Self::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConcordError>;

/// A per-item or per-run failure that was isolated from its siblings
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Subject index or run index within the batch
    pub index: usize,
    /// Subject identifier (or `run_<n>` for classification runs)
    pub id: String,
    /// Metric that failed, if the failure is metric-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    pub kind: String,
    pub message: String,
}

impl ItemFailure {
    #[must_use]
    pub fn new(index: usize, id: &str, metric: Option<&str>, error: &ConcordError) -> Self {
        Self {
            index,
            id: id.to_string(),
            metric: metric.map(str::to_string),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Agreement Types
// ============================================================================

/// One subject's paired observation across the two compared groups
#[derive(Debug, Clone)]
pub struct SubjectRecord {
    pub id: String,
    pub first: ArrayD<f64>,
    pub second: ArrayD<f64>,
}

impl SubjectRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, first: ArrayD<f64>, second: ArrayD<f64>) -> Self {
        Self {
            id: id.into(),
            first,
            second,
        }
    }

    /// Both entries must share one shape
    ///
    /// # Errors
    /// Returns `Precondition` naming the subject when the shapes differ
    pub fn validate(&self) -> Result<()> {
        if self.first.shape() == self.second.shape() {
            Ok(())
        } else {
            Err(ConcordError::Precondition(format!(
                "subject {}: shape {:?} does not match {:?}",
                self.id,
                self.first.shape(),
                self.second.shape()
            )))
        }
    }
}

/// Subjects x metrics table of agreement scores
///
/// Cells of failed (subject, metric) pairs hold NaN and are listed in
/// `failures`.
#[derive(Debug, Clone)]
pub struct AgreementTable {
    pub metrics: Vec<String>,
    pub subjects: Vec<String>,
    pub values: Array2<f64>,
    pub failures: Vec<ItemFailure>,
}

impl AgreementTable {
    /// Column of a named metric
    #[must_use]
    pub fn column(&self, metric: &str) -> Option<Array1<f64>> {
        let idx = self.metrics.iter().position(|m| m == metric)?;
        Some(self.values.column(idx).to_owned())
    }
}

/// Per-ROI agreement for a parcellation: one subjects x ROIs table per metric
#[derive(Debug, Clone)]
pub struct RoiAgreementTable {
    pub metric: String,
    pub subjects: Vec<String>,
    /// ROI labels taken from the reference parcellation
    pub rois: Vec<i64>,
    pub values: Array2<f64>,
    pub failures: Vec<ItemFailure>,
}

// ============================================================================
// Network Types
// ============================================================================

/// Weighted undirected graph derived from one adjacency matrix
///
/// Node `i` corresponds to ROI `i + 1`. Each undirected edge is stored in the
/// adjacency lists of both endpoints; a self-loop is stored once.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) adjacency: Vec<Vec<(usize, f64)>>,
    pub(crate) edge_count: usize,
}

impl Graph {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges, self-loops included
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Neighbours of `node` with edge weights
    #[must_use]
    pub fn neighbors(&self, node: usize) -> &[(usize, f64)] {
        &self.adjacency[node]
    }

    /// Weight of the edge between `a` and `b`, if present
    #[must_use]
    pub fn weight(&self, a: usize, b: usize) -> Option<f64> {
        self.adjacency
            .get(a)?
            .iter()
            .find(|(n, _)| *n == b)
            .map(|(_, w)| *w)
    }
}

/// One subject's connectivity matrix
#[derive(Debug, Clone)]
pub struct SubjectMatrix {
    pub id: String,
    pub matrix: Array2<f64>,
}

impl SubjectMatrix {
    #[must_use]
    pub fn new(id: impl Into<String>, matrix: Array2<f64>) -> Self {
        Self {
            id: id.into(),
            matrix,
        }
    }
}

/// Subjects x global-metric table
#[derive(Debug, Clone)]
pub struct GlobalMetricsTable {
    pub metrics: Vec<String>,
    pub subjects: Vec<String>,
    pub values: Array2<f64>,
    pub failures: Vec<ItemFailure>,
}

/// Subjects x ROIs table for one local metric
#[derive(Debug, Clone)]
pub struct LocalMetricsTable {
    pub metric: String,
    pub subjects: Vec<String>,
    pub values: Array2<f64>,
    pub failures: Vec<ItemFailure>,
}

// ============================================================================
// Learning Types
// ============================================================================

/// Integer class codes, one per feature-matrix row
pub type LabelVector = Array1<usize>;

/// Stacked samples of both groups with their encoded labels
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Rows = samples, columns = features
    pub data: Array2<f64>,
    pub labels: LabelVector,
    /// Group names; the position of a name is its class code
    pub classes: Vec<String>,
}

impl FeatureMatrix {
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// One stratified train/test partition over feature-matrix rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub run: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Resampling plan of one classification batch
#[derive(Debug, Clone)]
pub struct SplitPlan {
    pub test_fraction: f64,
    pub splits: Vec<Split>,
}

/// Outcome of training and scoring one split
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: usize,
    pub predicted: LabelVector,
    pub truth: LabelVector,
    /// Per-feature importance; sums to 1.0
    pub importance: Array1<f64>,
}

impl RunResult {
    /// Fraction of correctly predicted test samples
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> f64 {
        if self.truth.is_empty() {
            return 0.0;
        }
        let correct = self
            .predicted
            .iter()
            .zip(self.truth.iter())
            .filter(|(p, t)| p == t)
            .count();
        correct as f64 / self.truth.len() as f64
    }
}

/// Aggregated classification batch
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Indices of the runs that contributed a row
    pub runs: Vec<usize>,
    pub accuracy: Array1<f64>,
    /// runs x features
    pub importance: Array2<f64>,
    pub failures: Vec<ItemFailure>,
    pub seed: u64,
}

impl ClassificationReport {
    #[must_use]
    pub fn mean_accuracy(&self) -> Option<f64> {
        self.accuracy.mean()
    }

    /// Mean importance per feature across successful runs
    #[must_use]
    pub fn mean_importance(&self) -> Option<Array1<f64>> {
        self.importance.mean_axis(ndarray::Axis(0))
    }
}
