//! Named metric registries
//!
//! Each batch resolves the metric names it was asked for once, up front. An
//! unknown name fails the batch before any work is dispatched.

use crate::agreement;
use crate::network::{self, NetworkConfig};
use crate::structs::{ConcordError, Graph, Result};
use ndarray::{Array1, ArrayView2, ArrayViewD, Ix2};
use rand::rngs::StdRng;

/// Pairwise agreement metric over two arrays of one shape
pub type AgreementFn = fn(ArrayViewD<'_, f64>, ArrayViewD<'_, f64>) -> Result<f64>;

/// Graph -> scalar metric
pub type GlobalFn = fn(&Graph, &NetworkConfig, &mut StdRng) -> Result<f64>;

/// Graph -> per-node metric
pub type LocalFn = fn(&Graph) -> Result<Array1<f64>>;

/// Ordered mapping from metric identifier to function
#[derive(Debug, Clone)]
pub struct MetricRegistry<F> {
    entries: Vec<(&'static str, F)>,
}

impl<F: Copy> MetricRegistry<F> {
    #[must_use]
    pub fn new(entries: Vec<(&'static str, F)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<F> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    /// Resolve every requested name, preserving request order
    ///
    /// # Errors
    /// Returns `UnknownMetric` listing every name that is not registered
    pub fn select<N: AsRef<str>>(&self, names: &[N]) -> Result<Vec<(String, F)>> {
        if names.is_empty() {
            return Err(ConcordError::Config("no metrics requested".into()));
        }

        let mut selected = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            let name = name.as_ref();
            match self.get(name) {
                Some(f) => selected.push((name.to_string(), f)),
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(selected)
        } else {
            Err(ConcordError::UnknownMetric(format!(
                "{} (available: {})",
                missing.join(", "),
                self.names().join(", ")
            )))
        }
    }
}

// ============================================================================
// Agreement
// ============================================================================

fn dice_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::dice(&a, &b)
}

fn jaccard_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::jaccard(&a, &b)
}

fn volume_difference_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::volume_difference(&a, &b)
}

fn centroid_distance_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::centroid_distance(&a, &b)
}

fn euclid_distance_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::euclid_distance(&a, &b)
}

fn pearson_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::pearson(&a, &b)
}

fn as_points(v: ArrayViewD<'_, f64>) -> Result<ArrayView2<'_, f64>> {
    v.into_dimensionality::<Ix2>()
        .map_err(|e| ConcordError::Computation(format!("hausdorff expects 2-D points: {e}")))
}

fn hausdorff_entry(a: ArrayViewD<'_, f64>, b: ArrayViewD<'_, f64>) -> Result<f64> {
    agreement::hausdorff(&as_points(a)?, &as_points(b)?)
}

/// Registry of every pairwise agreement metric
#[must_use]
pub fn agreement_registry() -> MetricRegistry<AgreementFn> {
    MetricRegistry::new(vec![
        ("dice", dice_entry as AgreementFn),
        ("jaccard", jaccard_entry as AgreementFn),
        ("volume_difference", volume_difference_entry as AgreementFn),
        ("centroid_distance", centroid_distance_entry as AgreementFn),
        ("euclid_distance", euclid_distance_entry as AgreementFn),
        ("pearson", pearson_entry as AgreementFn),
        ("hausdorff", hausdorff_entry as AgreementFn),
    ])
}

// ============================================================================
// Network
// ============================================================================

fn global_degree(graph: &Graph, _: &NetworkConfig, _: &mut StdRng) -> Result<f64> {
    network::global::degree(graph)
}

fn global_cluster_coeff(graph: &Graph, config: &NetworkConfig, rng: &mut StdRng) -> Result<f64> {
    network::global::cluster_coeff(graph, config.clustering_trials, rng)
}

fn global_between_cent(graph: &Graph, _: &NetworkConfig, _: &mut StdRng) -> Result<f64> {
    network::global::between_cent(graph)
}

fn global_smallworldness(graph: &Graph, config: &NetworkConfig, rng: &mut StdRng) -> Result<f64> {
    network::smallworld::omega(graph, &config.smallworld, rng)
}

fn global_short_path(graph: &Graph, _: &NetworkConfig, _: &mut StdRng) -> Result<f64> {
    network::global::short_path(graph)
}

/// Registry of graph-level metrics; `smallworldness` and `short_path` are
/// opt-in because of their cost
#[must_use]
pub fn global_registry() -> MetricRegistry<GlobalFn> {
    MetricRegistry::new(vec![
        ("degree", global_degree as GlobalFn),
        ("cluster_coeff", global_cluster_coeff as GlobalFn),
        ("between_cent", global_between_cent as GlobalFn),
        ("smallworldness", global_smallworldness as GlobalFn),
        ("short_path", global_short_path as GlobalFn),
    ])
}

fn local_degree(graph: &Graph) -> Result<Array1<f64>> {
    Ok(network::local::degree(graph))
}

/// Registry of per-node metrics
#[must_use]
pub fn local_registry() -> MetricRegistry<LocalFn> {
    MetricRegistry::new(vec![
        ("degree", local_degree as LocalFn),
        ("between_cent", network::local::between_cent as LocalFn),
    ])
}

/// Metrics computed when the caller names none
pub const DEFAULT_GLOBAL_METRICS: [&str; 3] = ["degree", "cluster_coeff", "between_cent"];
pub const DEFAULT_LOCAL_METRICS: [&str; 2] = ["degree", "between_cent"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_preserves_order() {
        let selected = agreement_registry()
            .select(&["pearson", "hausdorff"])
            .expect("select");
        let names: Vec<&str> = selected.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["pearson", "hausdorff"]);
    }

    #[test]
    fn test_select_reports_all_missing() {
        let err = global_registry()
            .select(&["degree", "modularity", "assortativity"])
            .expect_err("unknown names");
        let msg = err.to_string();
        assert!(matches!(err, ConcordError::UnknownMetric(_)));
        assert!(msg.contains("modularity"));
        assert!(msg.contains("assortativity"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_defaults_are_registered() {
        assert!(global_registry().select(&DEFAULT_GLOBAL_METRICS).is_ok());
        assert!(local_registry().select(&DEFAULT_LOCAL_METRICS).is_ok());
    }

    #[test]
    fn test_empty_request() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            agreement_registry().select(&empty),
            Err(ConcordError::Config(_))
        ));
    }

    #[test]
    fn test_hausdorff_entry_rejects_volumes() {
        let f = agreement_registry().get("hausdorff").expect("registered");
        let v = ndarray::Array3::<f64>::ones((2, 2, 2)).into_dyn();
        let err = f(v.view(), v.view()).expect_err("3-D input");
        assert!(matches!(err, ConcordError::Computation(_)));
        assert!(!err.is_fatal());
    }
}
