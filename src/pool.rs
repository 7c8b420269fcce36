//! Per-batch worker pool
//!
//! A pool is built at batch start, sized to the available cores, and dropped
//! once the batch has been aggregated. Every task writes only its own output
//! slot; a panicking task becomes an error in that slot.

use crate::structs::{ConcordError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info};

/// Batch-level scheduling options
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchConfig {
    /// Worker count; `None` uses every available core
    pub threads: Option<usize>,
}

/// Fixed-size pool bounded by the available CPU cores
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// Build a pool for one batch
    ///
    /// # Errors
    /// Returns `Config` if zero threads are requested or the pool cannot start
    pub fn new(config: &BatchConfig) -> Result<Self> {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        let threads = match config.threads {
            Some(0) => {
                return Err(ConcordError::Config(
                    "thread count must be at least 1".into(),
                ))
            }
            Some(n) => n.min(available),
            None => available,
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("concord-worker-{i}"))
            .build()
            .map_err(|e| ConcordError::Config(format!("Failed to start worker pool: {e}")))?;

        debug!(threads, "worker pool started");
        Ok(Self { pool, threads })
    }

    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Run `task` over every item and return the per-index outcomes in input
    /// order. Returns only after every task has finished.
    pub fn run<I, T, F>(&self, items: &[I], task: F) -> Vec<Result<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(usize, &I) -> Result<T> + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(index, item)| isolate(index, || task(index, item)))
                .collect()
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        debug!(threads = self.threads, "worker pool shut down");
    }
}

/// Use the caller's seed, or draw one from entropy and log it so the batch
/// can be reproduced
#[must_use]
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let drawn = StdRng::from_entropy().gen();
        info!(seed = drawn, "no seed given, drew one from entropy");
        drawn
    })
}

/// Convert a panic inside one task into an error for that task only
fn isolate<T>(index: usize, task: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ConcordError::Computation(format!(
                "task {index} panicked: {message}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keep_input_order() {
        let pool = WorkerPool::new(&BatchConfig { threads: Some(4) }).expect("pool");
        let items: Vec<usize> = (0..100).collect();
        let results = pool.run(&items, |i, x| Ok(i * 1000 + x));

        for (i, r) in results.into_iter().enumerate() {
            assert_eq!(r.expect("ok"), i * 1001);
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        let pool = WorkerPool::new(&BatchConfig::default()).expect("pool");
        let items = vec![1.0_f64, 0.0, 2.0];
        let results = pool.run(&items, |_, x| {
            if *x == 0.0 {
                Err(ConcordError::EmptyInput("zero".into()))
            } else {
                Ok(1.0 / x)
            }
        });

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ConcordError::EmptyInput(_))));
        assert!((results[2].as_ref().expect("ok") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_panic_is_isolated() {
        let pool = WorkerPool::new(&BatchConfig { threads: Some(2) }).expect("pool");
        let items = vec![0usize, 1, 2];
        let results = pool.run(&items, |_, x| {
            assert!(*x != 1, "bad item");
            Ok(*x)
        });

        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        let err = results[1].as_ref().expect_err("panicked");
        assert!(err.to_string().contains("task 1 panicked"));
    }

    #[test]
    fn test_resolve_seed_keeps_explicit_seed() {
        assert_eq!(resolve_seed(Some(42)), 42);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            WorkerPool::new(&BatchConfig { threads: Some(0) }),
            Err(ConcordError::Config(_))
        ));
    }
}
