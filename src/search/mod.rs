//! Distributed best-first search (HDA*).
//!
//! Every worker owns the states whose fingerprint maps to its rank. A worker
//! expands its own frontier best-first and ships successors it does not own
//! to their owner in batched node records. Workers share the best goal cost
//! found so far, detect global quiescence with a token ring and finally
//! reconstruct the plan by walking parent links across workers.
//!
//! - [`worker`]: the per-worker state machine
//! - [`parallel`]: runtimes driving a world of workers (threads or a
//!   deterministic simulator)
//! - [`wire`], [`message`]: what travels between workers

pub mod config;
pub mod frontier;
pub mod incumbent;
pub mod message;
pub mod node;
pub mod parallel;
pub mod result;
pub mod termination;
pub mod wire;
pub mod worker;

pub use config::SearchConfig;
pub use incumbent::Incumbent;
pub use message::{Envelope, Message, Token, Transport};
pub use parallel::{
    run_distributed, run_simulated, ParallelConfig, SimConfig, Simulation,
};
pub use result::{Plan, SearchResult, WorkerOutcome, WorkerStatistics};
pub use worker::{HdaWorker, WorkerPhase};
