//! Weighted shortest paths with path counting (Brandes)

use crate::structs::{ConcordError, Graph, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Single-source shortest-path DAG
#[derive(Debug)]
pub struct ShortestPaths {
    /// Settled nodes in non-decreasing distance order
    pub order: Vec<usize>,
    pub dist: Vec<Option<f64>>,
    /// Number of shortest paths from the source
    pub sigma: Vec<f64>,
    /// Predecessors on shortest paths
    pub preds: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy)]
struct DijkstraState {
    cost: f64,
    node: usize,
}

impl PartialEq for DijkstraState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DijkstraState {}

impl PartialOrd for DijkstraState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DijkstraState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, ties broken by node index
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Edge weights are distances; negative weights make shortest paths undefined
///
/// # Errors
/// Returns `Computation` naming the metric when a negative weight is present
pub fn ensure_non_negative(graph: &Graph, metric: &str) -> Result<()> {
    if graph.has_negative_weights() {
        Err(ConcordError::Computation(format!(
            "{metric}: negative edge weights make shortest paths undefined"
        )))
    } else {
        Ok(())
    }
}

/// Dijkstra from `source`, counting shortest paths
///
/// With `weighted == false` every edge has length 1.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn single_source(graph: &Graph, source: usize, weighted: bool) -> ShortestPaths {
    let n = graph.node_count();
    let mut dist: Vec<Option<f64>> = vec![None; n];
    let mut tentative: Vec<Option<f64>> = vec![None; n];
    let mut sigma = vec![0.0; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut heap = BinaryHeap::new();

    sigma[source] = 1.0;
    tentative[source] = Some(0.0);
    heap.push(DijkstraState {
        cost: 0.0,
        node: source,
    });

    while let Some(DijkstraState { cost, node }) = heap.pop() {
        if dist[node].is_some() {
            continue;
        }
        dist[node] = Some(cost);
        order.push(node);

        for &(next, w) in graph.neighbors(node) {
            if dist[next].is_some() {
                continue;
            }
            let length = if weighted { w } else { 1.0 };
            let next_cost = cost + length;

            match tentative[next] {
                Some(best) if next_cost > best => {}
                Some(best) if next_cost == best => {
                    sigma[next] += sigma[node];
                    preds[next].push(node);
                }
                _ => {
                    tentative[next] = Some(next_cost);
                    sigma[next] = sigma[node];
                    preds[next] = vec![node];
                    heap.push(DijkstraState {
                        cost: next_cost,
                        node: next,
                    });
                }
            }
        }
    }

    ShortestPaths {
        order,
        dist,
        sigma,
        preds,
    }
}

/// Betweenness centrality of every node, endpoints excluded
///
/// Normalised by `1 / ((n - 1)(n - 2))` for `n > 2`. Unreachable pairs
/// contribute nothing.
///
/// # Errors
/// Returns `Computation` if the graph has negative weights
#[allow(clippy::cast_precision_loss)]
pub fn betweenness(graph: &Graph, weighted: bool) -> Result<Vec<f64>> {
    if weighted {
        ensure_non_negative(graph, "between_cent")?;
    }

    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    for source in 0..n {
        let paths = single_source(graph, source, weighted);
        let mut delta = vec![0.0; n];

        for &w in paths.order.iter().rev() {
            let coeff = (1.0 + delta[w]) / paths.sigma[w];
            for &v in &paths.preds[w] {
                delta[v] += paths.sigma[v] * coeff;
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for c in &mut centrality {
            *c *= scale;
        }
    }

    Ok(centrality)
}

/// Mean shortest-path length over all ordered node pairs
///
/// # Errors
/// `Computation` for a disconnected graph or negative weights,
/// `EmptyInput` for a graph without nodes
#[allow(clippy::cast_precision_loss)]
pub fn average_path_length(graph: &Graph, weighted: bool) -> Result<f64> {
    if weighted {
        ensure_non_negative(graph, "short_path")?;
    }

    let n = graph.node_count();
    match n {
        0 => return Err(ConcordError::EmptyInput("short_path: graph has no nodes".into())),
        1 => return Ok(0.0),
        _ => {}
    }

    let mut total = 0.0;
    for source in 0..n {
        let paths = single_source(graph, source, weighted);
        if paths.order.len() != n {
            return Err(ConcordError::Computation(
                "short_path: graph is not connected".into(),
            ));
        }
        total += paths.dist.iter().flatten().sum::<f64>();
    }

    Ok(total / (n * (n - 1)) as f64)
}
