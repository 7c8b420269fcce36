//! Network metric batches over subjects

use super::builder::validate_threshold;
use super::NetworkConfig;
use crate::pool::{resolve_seed, BatchConfig, WorkerPool};
use crate::registry::{global_registry, local_registry};
use crate::structs::{
    ConcordError, GlobalMetricsTable, Graph, ItemFailure, LocalMetricsTable, Result, SubjectMatrix,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

/// Every matrix must be square and share one ROI count
///
/// # Errors
/// Returns `Precondition` listing every offending subject, or `EmptyInput`
/// when no subjects are given
pub fn validate_matrices(subjects: &[SubjectMatrix]) -> Result<usize> {
    let Some(first) = subjects.first() else {
        return Err(ConcordError::EmptyInput("no subjects given".into()));
    };
    let n = first.matrix.nrows();

    let bad: Vec<String> = subjects
        .iter()
        .filter_map(|s| {
            let (rows, cols) = s.matrix.dim();
            if rows != cols {
                Some(format!("{}: {rows}x{cols} is not square", s.id))
            } else if rows != n {
                Some(format!("{}: {rows} ROIs, expected {n}", s.id))
            } else {
                None
            }
        })
        .collect();

    if bad.is_empty() {
        Ok(n)
    } else {
        Err(ConcordError::Precondition(bad.join("; ")))
    }
}

/// Compute graph-level metrics for every subject
///
/// Subject `i` draws its randomness from `seed + i`, so results do not
/// depend on worker scheduling.
///
/// # Errors
/// `UnknownMetric`, `Config`, `EmptyInput` or `Precondition` for
/// batch-level problems
pub fn run_global<N: AsRef<str>>(
    subjects: &[SubjectMatrix],
    metrics: &[N],
    config: &NetworkConfig,
    batch: &BatchConfig,
) -> Result<GlobalMetricsTable> {
    let selected = global_registry().select(metrics)?;
    validate_threshold(config.threshold)?;
    validate_matrices(subjects)?;
    let seed = resolve_seed(config.seed);

    let metric_names: Vec<String> = selected.iter().map(|(n, _)| n.clone()).collect();
    info!(
        subjects = subjects.len(),
        metrics = %metric_names.join(","),
        seed,
        "START: computing global network measures"
    );

    let pool = WorkerPool::new(batch)?;
    let outcomes = pool.run(subjects, |index, subject| {
        let graph = Graph::from_matrix(&subject.matrix, config.threshold)?;
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        Ok(selected
            .iter()
            .map(|(_, metric)| metric(&graph, config, &mut rng))
            .collect::<Vec<_>>())
    });
    drop(pool);

    let mut values = Array2::from_elem((subjects.len(), selected.len()), f64::NAN);
    let mut failures = Vec::new();

    for (row, (subject, outcome)) in subjects.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(scores) => {
                for (col, (score, name)) in scores.into_iter().zip(&metric_names).enumerate() {
                    match score {
                        Ok(v) => values[[row, col]] = v,
                        Err(e) => {
                            warn!(index = row, subject = %subject.id, metric = %name, "network metric failed: {e}");
                            failures.push(ItemFailure::new(row, &subject.id, Some(name), &e));
                        }
                    }
                }
            }
            Err(e) => {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(index = row, subject = %subject.id, "network task failed: {e}");
                failures.push(ItemFailure::new(row, &subject.id, None, &e));
            }
        }
    }

    info!(failures = failures.len(), "FINISHED: computing global network measures");

    Ok(GlobalMetricsTable {
        metrics: metric_names,
        subjects: subjects.iter().map(|s| s.id.clone()).collect(),
        values,
        failures,
    })
}

/// Compute per-node metrics for every subject, one table per metric
///
/// # Errors
/// `UnknownMetric`, `Config`, `EmptyInput` or `Precondition` for
/// batch-level problems
pub fn run_local<N: AsRef<str>>(
    subjects: &[SubjectMatrix],
    metrics: &[N],
    config: &NetworkConfig,
    batch: &BatchConfig,
) -> Result<Vec<LocalMetricsTable>> {
    let selected = local_registry().select(metrics)?;
    validate_threshold(config.threshold)?;
    let n = validate_matrices(subjects)?;

    info!(
        subjects = subjects.len(),
        rois = n,
        "START: computing local network measures"
    );

    let pool = WorkerPool::new(batch)?;
    let outcomes = pool.run(subjects, |_, subject| {
        let graph = Graph::from_matrix(&subject.matrix, config.threshold)?;
        Ok(selected
            .iter()
            .map(|(_, metric)| metric(&graph))
            .collect::<Vec<_>>())
    });
    drop(pool);

    let mut tables: Vec<LocalMetricsTable> = selected
        .iter()
        .map(|(name, _)| LocalMetricsTable {
            metric: name.clone(),
            subjects: subjects.iter().map(|s| s.id.clone()).collect(),
            values: Array2::from_elem((subjects.len(), n), f64::NAN),
            failures: Vec::new(),
        })
        .collect();

    for (row, (subject, outcome)) in subjects.iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(per_metric) => {
                for (table, values) in tables.iter_mut().zip(per_metric) {
                    match values {
                        Ok(v) => table.values.row_mut(row).assign(&v),
                        Err(e) => {
                            warn!(index = row, subject = %subject.id, metric = %table.metric, "network metric failed: {e}");
                            table
                                .failures
                                .push(ItemFailure::new(row, &subject.id, Some(&table.metric), &e));
                        }
                    }
                }
            }
            Err(e) => {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(index = row, subject = %subject.id, "network task failed: {e}");
                for table in &mut tables {
                    table
                        .failures
                        .push(ItemFailure::new(row, &subject.id, None, &e));
                }
            }
        }
    }

    info!("FINISHED: computing local network measures");
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DEFAULT_GLOBAL_METRICS, DEFAULT_LOCAL_METRICS};

    fn complete(n: usize) -> Array2<f64> {
        let mut m = Array2::<f64>::ones((n, n));
        m.diag_mut().fill(0.0);
        m
    }

    fn seeded() -> NetworkConfig {
        NetworkConfig {
            threshold: Some(0.5),
            seed: Some(5),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_global_complete_graph() {
        let subjects = vec![
            SubjectMatrix::new("s1", complete(4)),
            SubjectMatrix::new("s2", complete(4)),
        ];
        let table = run_global(
            &subjects,
            &DEFAULT_GLOBAL_METRICS,
            &seeded(),
            &BatchConfig::default(),
        )
        .expect("table");

        assert_eq!(table.metrics, vec!["degree", "cluster_coeff", "between_cent"]);
        assert_eq!(table.values.dim(), (2, 3));
        assert!(table.failures.is_empty());
        for row in table.values.rows() {
            assert!((row[0] - 3.0).abs() < 1e-12);
            assert!((row[1] - 1.0).abs() < 1e-12);
            assert!(row[2].abs() < 1e-12);
        }
    }

    #[test]
    fn test_global_reproducible_across_thread_counts() {
        let mut sparse = complete(6);
        sparse[[0, 1]] = 0.0;
        sparse[[1, 0]] = 0.0;
        sparse[[2, 4]] = 0.0;
        sparse[[4, 2]] = 0.0;
        let subjects: Vec<SubjectMatrix> = (0..6)
            .map(|i| SubjectMatrix::new(format!("s{i}"), sparse.clone()))
            .collect();

        let one = run_global(
            &subjects,
            &["cluster_coeff"],
            &seeded(),
            &BatchConfig { threads: Some(1) },
        )
        .expect("table");
        let many = run_global(
            &subjects,
            &["cluster_coeff"],
            &seeded(),
            &BatchConfig { threads: Some(4) },
        )
        .expect("table");
        assert_eq!(one.values, many.values);
    }

    #[test]
    fn test_global_failure_is_recorded() {
        let mut disconnected = complete(4);
        disconnected.row_mut(3).fill(0.0);
        disconnected.column_mut(3).fill(0.0);
        let subjects = vec![
            SubjectMatrix::new("ok", complete(4)),
            SubjectMatrix::new("split", disconnected),
        ];

        let table = run_global(
            &subjects,
            &["degree", "short_path"],
            &seeded(),
            &BatchConfig::default(),
        )
        .expect("table");

        assert!((table.values[[0, 1]] - 1.0).abs() < 1e-12);
        assert!(table.values[[1, 0]].is_finite());
        assert!(table.values[[1, 1]].is_nan());
        assert_eq!(table.failures.len(), 1);
        assert_eq!(table.failures[0].id, "split");
        assert_eq!(table.failures[0].metric.as_deref(), Some("short_path"));
    }

    #[test]
    fn test_mismatched_sizes_abort() {
        let subjects = vec![
            SubjectMatrix::new("a", complete(4)),
            SubjectMatrix::new("b", complete(5)),
        ];
        assert!(matches!(
            run_global(&subjects, &["degree"], &seeded(), &BatchConfig::default()),
            Err(ConcordError::Precondition(_))
        ));
        assert!(matches!(
            run_global(&subjects, &["modularity"], &seeded(), &BatchConfig::default()),
            Err(ConcordError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_bad_threshold_fails_before_dispatch() {
        let config = NetworkConfig {
            threshold: Some(-1.0),
            ..seeded()
        };
        let subjects = vec![SubjectMatrix::new("a", complete(4))];
        assert!(matches!(
            run_global(&subjects, &["degree"], &config, &BatchConfig::default()),
            Err(ConcordError::Config(_))
        ));
        // rejected ahead of the subject checks too
        assert!(matches!(
            run_local(&[], &["degree"], &config, &BatchConfig::default()),
            Err(ConcordError::Config(_))
        ));
    }

    #[test]
    fn test_local_tables() {
        let subjects = vec![
            SubjectMatrix::new("a", complete(4)),
            SubjectMatrix::new("b", complete(4) * 0.25),
        ];
        let tables = run_local(
            &subjects,
            &DEFAULT_LOCAL_METRICS,
            &NetworkConfig::default(),
            &BatchConfig::default(),
        )
        .expect("tables");

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].metric, "degree");
        assert_eq!(tables[0].values.dim(), (2, 4));
        assert!(tables[0].values.row(0).iter().all(|v| (v - 3.0).abs() < 1e-12));
        assert!(tables[0].values.row(1).iter().all(|v| (v - 0.75).abs() < 1e-12));
        assert!(tables[1].values.iter().all(|v| v.abs() < 1e-12));
    }
}
