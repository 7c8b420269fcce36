//! Adjacency matrix -> weighted undirected graph

use crate::structs::{ConcordError, Graph, Result};
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// # Errors
/// Returns `Config` for a negative or non-finite threshold
pub fn validate_threshold(threshold: Option<f64>) -> Result<()> {
    match threshold {
        Some(t) if !t.is_finite() || t < 0.0 => Err(ConcordError::Config(format!(
            "threshold must be a finite non-negative number, got {t}"
        ))),
        _ => Ok(()),
    }
}

/// Replace NaN with 0, then zero every entry with `|w| < threshold`
///
/// # Errors
/// Returns `Config` for a negative or non-finite threshold
pub fn clean_matrix<S>(matrix: &ArrayBase<S, Ix2>, threshold: Option<f64>) -> Result<Array2<f64>>
where
    S: Data<Elem = f64>,
{
    validate_threshold(threshold)?;

    Ok(matrix.mapv(|w| {
        let w = if w.is_nan() { 0.0 } else { w };
        match threshold {
            Some(t) if w.abs() < t => 0.0,
            _ => w,
        }
    }))
}

impl Graph {
    /// Build a graph from a square adjacency matrix
    ///
    /// One edge per nonzero upper-triangle entry (diagonal included) after
    /// cleaning. Symmetry is not repaired and self-loops are kept.
    ///
    /// # Errors
    /// `Precondition` if the matrix is not square, `Config` for a bad threshold
    pub fn from_matrix<S>(matrix: &ArrayBase<S, Ix2>, threshold: Option<f64>) -> Result<Self>
    where
        S: Data<Elem = f64>,
    {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(ConcordError::Precondition(format!(
                "adjacency matrix is {rows}x{cols}, expected square"
            )));
        }

        let cleaned = clean_matrix(matrix, threshold)?;
        let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); rows];
        let mut edge_count = 0;

        for i in 0..rows {
            for j in i..rows {
                let w = cleaned[[i, j]];
                if w == 0.0 {
                    continue;
                }
                adjacency[i].push((j, w));
                if i != j {
                    adjacency[j].push((i, w));
                }
                edge_count += 1;
            }
        }

        Ok(Self {
            adjacency,
            edge_count,
        })
    }

    /// Whether any edge carries a negative weight
    #[must_use]
    pub fn has_negative_weights(&self) -> bool {
        self.adjacency
            .iter()
            .flatten()
            .any(|(_, w)| *w < 0.0)
    }

    /// Whether every node can reach every other node
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let n = self.node_count();
        if n == 0 {
            return false;
        }
        let mut seen = vec![false; n];
        let mut stack = vec![0];
        seen[0] = true;
        let mut reached = 1;
        while let Some(node) = stack.pop() {
            for &(next, _) in &self.adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    reached += 1;
                    stack.push(next);
                }
            }
        }
        reached == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn complete4() -> Array2<f64> {
        let mut m = Array2::<f64>::ones((4, 4));
        m.diag_mut().fill(0.0);
        m
    }

    #[test]
    fn test_complete_graph() {
        let g = Graph::from_matrix(&complete4(), Some(0.5)).expect("graph");
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 6);
        assert!(g
            .adjacency
            .iter()
            .flatten()
            .all(|(_, w)| (*w - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_nan_and_threshold() {
        let m = array![
            [0.0, f64::NAN, 0.2],
            [f64::NAN, 0.0, -0.8],
            [0.2, -0.8, 0.0]
        ];
        let g = Graph::from_matrix(&m, Some(0.3)).expect("graph");
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.weight(1, 2), Some(-0.8));
        assert_eq!(g.weight(0, 1), None);
        assert!(g.has_negative_weights());

        let unthresholded = Graph::from_matrix(&m, None).expect("graph");
        assert_eq!(unthresholded.edge_count(), 2);
    }

    #[test]
    fn test_self_loops_kept() {
        let m = array![[2.0, 1.0], [1.0, 0.0]];
        let g = Graph::from_matrix(&m, None).expect("graph");
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.weight(0, 0), Some(2.0));
        assert_eq!(g.neighbors(0).len(), 2);
        assert_eq!(g.neighbors(1).len(), 1);
    }

    #[test]
    fn test_rejects_non_square() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            Graph::from_matrix(&m, None),
            Err(ConcordError::Precondition(_))
        ));
        assert!(matches!(
            Graph::from_matrix(&complete4(), Some(-1.0)),
            Err(ConcordError::Config(_))
        ));
    }

    #[test]
    fn test_isolated_node_disconnects() {
        let mut m = complete4();
        m.row_mut(3).fill(0.0);
        m.column_mut(3).fill(0.0);
        let g = Graph::from_matrix(&m, None).expect("graph");
        assert!(!g.is_connected());
        assert!(Graph::from_matrix(&complete4(), None)
            .expect("graph")
            .is_connected());
    }

    proptest! {
        #[test]
        fn prop_threshold_monotone(
            values in prop::collection::vec(-1.0f64..1.0, 36),
            t1 in 0.0f64..1.0,
            t2 in 0.0f64..1.0,
        ) {
            let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let raw = Array2::from_shape_vec((6, 6), values).expect("shape");
            let m = &raw + &raw.t();
            let low = Graph::from_matrix(&m, Some(lo)).expect("graph");
            let high = Graph::from_matrix(&m, Some(hi)).expect("graph");
            prop_assert!(high.edge_count() <= low.edge_count());
        }
    }
}
