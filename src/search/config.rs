//! Configuration types for the distributed search

use crate::heuristic::HeuristicKind;

/// Per-worker search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// A destination buffer is flushed once it holds more than this many
    /// node records (0 = send every step that produced a record).
    pub flush_threshold: usize,
    /// Total bytes buffered across destinations before every buffer is
    /// flushed regardless of the threshold.
    pub max_buffered_bytes: usize,
    /// Consecutive idle steps worker 0 waits before starting a termination
    /// lap.
    pub termination_debounce: u32,
    /// Heuristic each worker builds for itself.
    pub heuristic: HeuristicKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 0,
            max_buffered_bytes: 64 * 1024 * 1024,
            termination_debounce: 100,
            heuristic: HeuristicKind::default(),
        }
    }
}

impl SearchConfig {
    pub fn with_flush_threshold(mut self, records: usize) -> Self {
        self.flush_threshold = records;
        self
    }

    pub fn with_max_buffered_bytes(mut self, bytes: usize) -> Self {
        self.max_buffered_bytes = bytes.max(1);
        self
    }

    pub fn with_termination_debounce(mut self, steps: u32) -> Self {
        self.termination_debounce = steps;
        self
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicKind) -> Self {
        self.heuristic = heuristic;
        self
    }
}
