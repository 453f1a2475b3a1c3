//! Runtimes that drive a world of [`HdaWorker`](crate::search::HdaWorker)s.
//!
//! - **Threaded** ([`run_distributed`]): one OS thread per worker, each
//!   with a crossbeam inbox. Workers synchronize on a barrier after seeding
//!   and can be stopped by a wall-clock timeout.
//! - **Simulated** ([`Simulation`]): all workers on the calling thread,
//!   stepped in shuffled order over a network that delays and reorders
//!   messages from a seed. Used by tests and by hash candidate trials.
//!
//! # Example
//!
//! ```ignore
//! use hdastar::search::{run_distributed, ParallelConfig, SearchConfig};
//!
//! let config = ParallelConfig::default()
//!     .with_workers(4)
//!     .with_timeout(Duration::from_secs(60));
//!
//! let result = run_distributed(task, hash, &SearchConfig::default(), &config)?;
//! ```

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod sim;

pub use channel::{create_transports, ChannelTransport, StopFlag};
pub use config::ParallelConfig;
pub use coordinator::run_distributed;
pub use sim::{run_simulated, SimConfig, SimNetwork, SimTransport, Simulation};
