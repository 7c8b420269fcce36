//! Graph construction and network metrics for connectivity matrices

pub mod batch;
pub mod builder;
pub mod global;
pub mod local;
pub mod paths;
pub mod smallworld;

/// Threshold applied by the CLI when none is given
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Reference-graph settings for the small-world coefficient
#[derive(Debug, Clone, Copy)]
pub struct SmallWorldConfig {
    /// Rewiring rounds per edge for each reference graph
    pub niter: usize,
    /// Number of random reference graphs
    pub nrand: usize,
}

impl Default for SmallWorldConfig {
    fn default() -> Self {
        Self {
            niter: 100,
            nrand: 10,
        }
    }
}

/// Configuration for graph construction and metric estimation
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Entries with `|w| < threshold` are dropped
    pub threshold: Option<f64>,
    /// Trials of the stochastic clustering estimator
    pub clustering_trials: usize,
    /// Base seed; subject `i` uses `seed + i`
    pub seed: Option<u64>,
    pub smallworld: SmallWorldConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            clustering_trials: 100,
            seed: None,
            smallworld: SmallWorldConfig::default(),
        }
    }
}
