//! Train/score per split and aggregate into accuracy and importance tables

use super::split::{generate_splits, validate_split};
use super::{ClassifyConfig, DegeneratePolicy, ForestParams};
use crate::pool::{resolve_seed, BatchConfig, WorkerPool};
use crate::structs::{
    ClassificationReport, ConcordError, FeatureMatrix, ItemFailure, Result, RunResult, Split,
};
use linfa::traits::{Fit, Predict};
use linfa::{DatasetBase, ParamGuard};
use ndarray::{Array1, Array2, Axis};
use tracing::{info, warn};

/// Forest seed of one run, derived from the batch seed
const fn forest_seed(seed: u64, run: usize) -> u64 {
    seed.wrapping_add(run as u64).wrapping_add(1)
}

/// Fit a forest on the train rows of `split` and predict its test rows
///
/// # Errors
/// `DegenerateSplit` if a class is missing on either side, `Config` for bad
/// forest parameters, `Computation` if the importance vector does not sum
/// to one
pub fn train_and_score(
    features: &FeatureMatrix,
    split: &Split,
    params: &ForestParams,
) -> Result<RunResult> {
    validate_split(split, &features.labels, features.n_classes())?;

    let train_x = features.data.select(Axis(0), &split.train);
    let train_y = features.labels.select(Axis(0), &split.train);
    let test_x = features.data.select(Axis(0), &split.test);
    let truth = features.labels.select(Axis(0), &split.test);

    let dataset = DatasetBase::new(train_x, train_y);
    let model = params.check_ref()?.fit(&dataset)?;
    let predicted: Array1<usize> = model.predict(&test_x);

    let importance = model.feature_importance().clone();
    let total = importance.sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(ConcordError::Computation(format!(
            "feature importance sums to {total}, no tree found an informative split"
        )));
    }

    Ok(RunResult {
        run: split.run,
        predicted,
        truth,
        importance,
    })
}

/// Reduce per-run outcomes into the accuracy vector and importance matrix
///
/// Failed runs are excluded from both and listed in `failures` by run index.
///
/// # Errors
/// Returns the first fatal error, or a `DegenerateSplit` under
/// [`DegeneratePolicy::Abort`]
pub fn aggregate(
    outcomes: Vec<(usize, Result<RunResult>)>,
    n_features: usize,
    policy: DegeneratePolicy,
    seed: u64,
) -> Result<ClassificationReport> {
    let mut runs = Vec::new();
    let mut accuracy = Vec::new();
    let mut importance = Vec::new();
    let mut failures = Vec::new();

    for (run, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                runs.push(run);
                accuracy.push(result.accuracy());
                importance.extend(result.importance.iter().copied());
            }
            Err(e) => {
                let abort = e.is_fatal()
                    || (policy == DegeneratePolicy::Abort
                        && matches!(e, ConcordError::DegenerateSplit { .. }));
                if abort {
                    return Err(e);
                }
                warn!(run, "classification run failed: {e}");
                failures.push(ItemFailure::new(run, &format!("run_{run}"), None, &e));
            }
        }
    }

    let importance = Array2::from_shape_vec((runs.len(), n_features), importance)
        .map_err(|e| ConcordError::Computation(format!("importance matrix: {e}")))?;

    Ok(ClassificationReport {
        runs,
        accuracy: Array1::from(accuracy),
        importance,
        failures,
        seed,
    })
}

/// Run the full resampled classification batch
///
/// # Errors
/// `Config` for bad parameters; `DegenerateSplit` before any run starts when
/// the policy is [`DegeneratePolicy::Abort`]
pub fn run_classification(
    features: &FeatureMatrix,
    config: &ClassifyConfig,
) -> Result<ClassificationReport> {
    config.forest.check_ref()?;
    let seed = resolve_seed(config.seed);
    let plan = generate_splits(features, config.test_fraction, config.runs, seed)?;

    if config.degenerate_policy == DegeneratePolicy::Abort {
        for split in &plan.splits {
            validate_split(split, &features.labels, features.n_classes())?;
        }
    }

    info!(
        samples = features.n_samples(),
        features = features.n_features(),
        runs = config.runs,
        seed,
        "START: classification"
    );

    let pool = WorkerPool::new(&BatchConfig {
        threads: config.threads,
    })?;
    let outcomes = pool.run(&plan.splits, |_, split| {
        let params = config.forest.clone().seed(forest_seed(seed, split.run));
        train_and_score(features, split, &params)
    });
    drop(pool);

    let report = aggregate(
        plan.splits.iter().map(|s| s.run).zip(outcomes).collect(),
        features.n_features(),
        config.degenerate_policy,
        seed,
    )?;

    match report.mean_accuracy() {
        Some(mean) => info!(
            succeeded = report.runs.len(),
            failed = report.failures.len(),
            mean_accuracy = mean,
            "FINISHED: classification"
        ),
        None => warn!(
            failed = report.failures.len(),
            "FINISHED: classification, no run succeeded"
        ),
    }

    Ok(report)
}
