//! hdastar: distributed best-first search over finite-domain planning tasks
//! with pluggable work-distribution hashes.
//!
//! - [`task`]: the planning task model and per-variable transition graphs
//! - [`partition`]: domain partitioning used by structured hashes
//! - [`hash`]: work-distribution hashes and candidate selection
//! - [`heuristic`]: state evaluators
//! - [`search`]: HDA* workers and the runtimes that drive them

pub mod error;
pub mod hash;
pub mod heuristic;
pub mod partition;
pub mod search;
pub mod task;
