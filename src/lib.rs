//! Reproducibility checks for parallel neuroimaging pipelines
//!
//! Three engines share one batch model: agreement metrics between paired
//! observations of the same subjects, graph metrics of connectivity
//! matrices, and resampled random-forest classification of two groups.
//! Each batch resolves its metrics up front, runs items on a per-batch
//! worker pool, and isolates per-item failures from the aggregate.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args, clippy::module_name_repetitions)]

pub mod agreement;
pub mod learning;
pub mod logging;
pub mod network;
pub mod output;
pub mod pool;
pub mod registry;
pub mod structs;
pub mod table_io;

pub use structs::{ConcordError, Result};
