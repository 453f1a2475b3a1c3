//! Error types shared across the crate.

use std::path::PathBuf;

/// Errors raised while loading or validating a planning task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("failed to read task file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed task description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("variable {var} ({name}) has an empty domain")]
    EmptyDomain { var: usize, name: String },

    #[error("initial state has {found} values but the task has {expected} variables")]
    InitialArity { expected: usize, found: usize },

    #[error("{context}: variable {var} out of range ({num_vars} variables)")]
    UnknownVariable {
        context: String,
        var: usize,
        num_vars: usize,
    },

    #[error("{context}: value {value} out of range for variable {var} (domain {domain})")]
    ValueOutOfRange {
        context: String,
        var: usize,
        value: u16,
        domain: usize,
    },

    #[error("operator {0} has a negative cost")]
    NegativeCost(String),

    #[error("task has {0} variables, more than a state record can address")]
    TooManyVariables(usize),

    #[error("variable {var} ({name}) has {domain} values, more than a state value can hold")]
    DomainTooLarge {
        var: usize,
        name: String,
        domain: usize,
    },

    #[error("plan refers to unknown operator {0}")]
    UnknownOperator(usize),

    #[error("plan cost overflows")]
    CostOverflow,
}

/// Errors raised while constructing a distribution hash.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to read fingerprint table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fingerprint table line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("fingerprint table line {line}: expected {expected} state values, found {found}")]
    Arity {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("candidate selection needs at least one candidate")]
    NoCandidates,

    #[error("candidate trial failed: {0}")]
    Trial(#[from] Box<SearchError>),
}

/// Errors raised by the search runtimes.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("world size must be at least 1")]
    EmptyWorld,

    #[error("simulation did not terminate within {0} rounds")]
    RoundLimit(u64),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}
