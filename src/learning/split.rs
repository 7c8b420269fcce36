//! Stratified shuffle splits

use crate::structs::{ConcordError, FeatureMatrix, LabelVector, Result, Split, SplitPlan};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Per-class test-set sizes proportional to class frequency
///
/// Floors first, then hands the remaining slots to the largest remainders;
/// ties go to the lower class code.
#[allow(clippy::cast_precision_loss)]
fn allocate(counts: &[usize], n_test: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 * n_test as f64 / n as f64)
        .collect();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&i, &j| {
        let ri = exact[i] - exact[i].floor();
        let rj = exact[j] - exact[j].floor();
        rj.total_cmp(&ri).then(i.cmp(&j))
    });

    let mut remaining = n_test - alloc.iter().sum::<usize>();
    for &k in order.iter().cycle().take(order.len() * 2) {
        if remaining == 0 {
            break;
        }
        if alloc[k] < counts[k] {
            alloc[k] += 1;
            remaining -= 1;
        }
    }
    alloc
}

/// Generate `runs` independent stratified train/test partitions
///
/// The test set holds `ceil(test_fraction * n)` samples split across classes
/// in proportion to their frequency. Index lists are sorted.
///
/// # Errors
/// `Config` for a fraction outside (0, 1), zero runs, or a fraction that
/// leaves the train or test set empty
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn generate_splits(
    features: &FeatureMatrix,
    test_fraction: f64,
    runs: usize,
    seed: u64,
) -> Result<SplitPlan> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ConcordError::Config(format!(
            "test fraction must lie in (0, 1), got {test_fraction}"
        )));
    }
    if runs == 0 {
        return Err(ConcordError::Config("runs must be at least 1".into()));
    }

    let n = features.n_samples();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ConcordError::Config(format!(
            "test fraction {test_fraction} of {n} samples leaves an empty train or test set"
        )));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); features.n_classes()];
    for (i, &label) in features.labels.iter().enumerate() {
        by_class[label].push(i);
    }
    let counts: Vec<usize> = by_class.iter().map(Vec::len).collect();
    let test_sizes = allocate(&counts, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let splits = (0..runs)
        .map(|run| {
            let mut train = Vec::with_capacity(n - n_test);
            let mut test = Vec::with_capacity(n_test);
            for (members, &k) in by_class.iter().zip(&test_sizes) {
                let mut shuffled = members.clone();
                shuffled.shuffle(&mut rng);
                test.extend_from_slice(&shuffled[..k]);
                train.extend_from_slice(&shuffled[k..]);
            }
            train.sort_unstable();
            test.sort_unstable();
            Split { run, train, test }
        })
        .collect();

    Ok(SplitPlan {
        test_fraction,
        splits,
    })
}

/// A split must contain every class on both sides
///
/// # Errors
/// Returns `DegenerateSplit` naming the missing class and side
pub fn validate_split(split: &Split, labels: &LabelVector, n_classes: usize) -> Result<()> {
    for (side, indices) in [("train", &split.train), ("test", &split.test)] {
        let mut present = vec![false; n_classes];
        for &i in indices {
            present[labels[i]] = true;
        }
        let missing: Vec<String> = present
            .iter()
            .enumerate()
            .filter(|(_, p)| !**p)
            .map(|(c, _)| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConcordError::DegenerateSplit {
                run: split.run,
                detail: format!("class {} absent from {side}", missing.join(", ")),
            });
        }
    }
    Ok(())
}
