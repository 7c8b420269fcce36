//! Per-node metrics, one value per ROI

use super::paths;
use crate::structs::{Graph, Result};
use ndarray::Array1;

/// Weighted degree: sum of incident edge weights
///
/// A self-loop contributes its weight twice.
#[must_use]
pub fn degree(graph: &Graph) -> Array1<f64> {
    (0..graph.node_count())
        .map(|node| {
            graph
                .neighbors(node)
                .iter()
                .map(|&(next, w)| if next == node { 2.0 * w } else { w })
                .sum()
        })
        .collect()
}

/// Normalised weighted betweenness centrality, endpoints excluded
///
/// # Errors
/// Returns `Computation` if the graph has negative weights
pub fn between_cent(graph: &Graph) -> Result<Array1<f64>> {
    paths::betweenness(graph, true).map(Array1::from)
}
