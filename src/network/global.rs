//! Graph-level scalar metrics

use super::{local, paths};
use crate::structs::{ConcordError, Graph, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

fn require_nodes(graph: &Graph, metric: &str) -> Result<()> {
    if graph.node_count() == 0 {
        Err(ConcordError::EmptyInput(format!("{metric}: graph has no nodes")))
    } else {
        Ok(())
    }
}

/// Mean weighted degree
///
/// # Errors
/// Returns `EmptyInput` for a graph without nodes
pub fn degree(graph: &Graph) -> Result<f64> {
    require_nodes(graph, "degree")?;
    local::degree(graph)
        .mean()
        .ok_or_else(|| ConcordError::EmptyInput("degree: graph has no nodes".into()))
}

/// Stochastic estimate of the average clustering coefficient
///
/// Each trial picks a node uniformly and two of its distinct neighbours;
/// the estimate is the fraction of trials in which those neighbours are
/// adjacent. Trials on nodes with fewer than two neighbours count as open.
///
/// # Errors
/// `EmptyInput` for a graph without nodes, `Config` for zero trials
#[allow(clippy::cast_precision_loss)]
pub fn cluster_coeff(graph: &Graph, trials: usize, rng: &mut StdRng) -> Result<f64> {
    require_nodes(graph, "cluster_coeff")?;
    if trials == 0 {
        return Err(ConcordError::Config(
            "cluster_coeff: trials must be at least 1".into(),
        ));
    }

    let n = graph.node_count();
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|node| {
            graph
                .neighbors(node)
                .iter()
                .map(|&(next, _)| next)
                .filter(|&next| next != node)
                .collect()
        })
        .collect();

    let mut triangles = 0usize;
    for _ in 0..trials {
        let node = rng.gen_range(0..n);
        let candidates = &neighbours[node];
        if candidates.len() < 2 {
            continue;
        }
        let mut pair = candidates.choose_multiple(rng, 2);
        if let (Some(&u), Some(&v)) = (pair.next(), pair.next()) {
            if graph.weight(u, v).is_some() {
                triangles += 1;
            }
        }
    }

    Ok(triangles as f64 / trials as f64)
}

/// Mean normalised betweenness centrality
///
/// # Errors
/// `Computation` for negative weights, `EmptyInput` for an empty graph
pub fn between_cent(graph: &Graph) -> Result<f64> {
    require_nodes(graph, "between_cent")?;
    local::between_cent(graph)?
        .mean()
        .ok_or_else(|| ConcordError::EmptyInput("between_cent: graph has no nodes".into()))
}

/// Weighted average shortest-path length
///
/// # Errors
/// `Computation` if the graph is disconnected or has negative weights
pub fn short_path(graph: &Graph) -> Result<f64> {
    paths::average_path_length(graph, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    fn complete(n: usize) -> Graph {
        let mut m = Array2::<f64>::ones((n, n));
        m.diag_mut().fill(0.0);
        Graph::from_matrix(&m, Some(0.5)).expect("graph")
    }

    fn ring(n: usize) -> Graph {
        let mut m = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            let j = (i + 1) % n;
            m[[i, j]] = 1.0;
            m[[j, i]] = 1.0;
        }
        Graph::from_matrix(&m, None).expect("graph")
    }

    #[test]
    fn test_degree_matches_local_mean() {
        let g = complete(4);
        assert!((degree(&g).expect("degree") - 3.0).abs() < 1e-12);

        let mut m = Array2::<f64>::zeros((4, 4));
        m[[0, 1]] = 0.4;
        m[[1, 0]] = 0.4;
        m[[2, 3]] = 0.9;
        m[[3, 2]] = 0.9;
        let g = Graph::from_matrix(&m, Some(0.3)).expect("graph");
        let expected = local::degree(&g).mean().expect("mean");
        assert!((degree(&g).expect("degree") - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph() {
        let g = Graph::from_matrix(&Array2::<f64>::zeros((0, 0)), None).expect("graph");
        assert!(matches!(degree(&g), Err(ConcordError::EmptyInput(_))));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            cluster_coeff(&g, 10, &mut rng),
            Err(ConcordError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_cluster_coeff_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        let c = cluster_coeff(&complete(5), 100, &mut rng).expect("clustering");
        assert!((c - 1.0).abs() < 1e-12);

        let c = cluster_coeff(&ring(6), 100, &mut rng).expect("clustering");
        assert!(c.abs() < 1e-12);
    }

    #[test]
    fn test_cluster_coeff_reproducible() {
        // triangle 0-1-2 with a tail 2-3-4
        let mut m = Array2::<f64>::zeros((5, 5));
        for (a, b) in [(0, 1), (1, 2), (0, 2), (2, 3), (3, 4)] {
            m[[a, b]] = 1.0;
            m[[b, a]] = 1.0;
        }
        let g = Graph::from_matrix(&m, None).expect("graph");
        let first = cluster_coeff(&g, 100, &mut StdRng::seed_from_u64(42)).expect("c");
        let second = cluster_coeff(&g, 100, &mut StdRng::seed_from_u64(42)).expect("c");
        assert!((first - second).abs() < f64::EPSILON);
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn test_between_cent_complete_graph() {
        assert!(between_cent(&complete(4)).expect("bc").abs() < 1e-12);
    }

    #[test]
    fn test_short_path_ring() {
        // ring of 4: each node has distances 1, 1, 2
        let l = short_path(&ring(4)).expect("length");
        assert!((l - 4.0 / 3.0).abs() < 1e-12);
    }
}
