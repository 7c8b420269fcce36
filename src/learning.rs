//! Cross-validated group classification with feature-importance ranking

pub mod evaluate;
pub mod features;
pub mod forest;
pub mod split;

pub use evaluate::{aggregate, run_classification, train_and_score};
pub use forest::{ForestParams, RandomForest};
pub use split::{generate_splits, validate_split};

/// What to do with a split that lacks a class in train or test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DegeneratePolicy {
    /// Exclude the run from the aggregate and report it in `failures`
    #[default]
    SkipAndFlag,
    /// Fail the whole batch before any run is dispatched
    Abort,
}

/// Configuration for one classification batch
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    pub test_fraction: f64,
    pub runs: usize,
    pub forest: ForestParams,
    /// Base seed for splits and forests; `None` draws one from entropy
    pub seed: Option<u64>,
    pub degenerate_policy: DegeneratePolicy,
    pub threads: Option<usize>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.1,
            runs: 100,
            forest: ForestParams::default(),
            seed: None,
            degenerate_policy: DegeneratePolicy::default(),
            threads: None,
        }
    }
}
