//! Search result types and statistics

use crate::task::OperatorId;
use std::time::Duration;

/// A solution: operator indices from the initial state to a goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operators: Vec<OperatorId>,
    pub cost: i32,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Statistics from one worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStatistics {
    pub rank: usize,
    /// Total time from initialization to completion
    pub elapsed_time: Duration,
    /// Nodes expanded (goal nodes are not expanded)
    pub expanded: u64,
    /// Successors generated
    pub generated: u64,
    /// Heuristic evaluations
    pub evaluated: u64,
    /// States recognized as dead ends
    pub dead_ends: u64,
    /// Closed nodes reopened with a cheaper path
    pub reopened: u64,
    /// Incoming nodes discarded as not cheaper than a known path
    pub duplicates: u64,
    /// Nodes or successors discarded against the incumbent bound
    pub pruned_by_incumbent: u64,
    /// Goals that improved the incumbent
    pub goals_found: u64,
    /// Node records sent to other workers
    pub nodes_sent: u64,
    /// Node records received from other workers
    pub nodes_received: u64,
    /// Node batches sent
    pub batches_sent: u64,
    /// Incumbent updates sent
    pub incumbent_messages: u64,
    /// Termination tokens and announcements sent
    pub termination_messages: u64,
    /// Plan reconstruction messages sent
    pub plan_messages: u64,
    /// Malformed or truncated records received
    pub protocol_errors: u64,
    /// Distinct states registered
    pub registered_states: u64,
    /// Largest frontier size
    pub frontier_high_water: u64,
}

impl WorkerStatistics {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            ..Default::default()
        }
    }

    /// Add the counters of `other`; the elapsed time is the longer of both.
    pub fn absorb(&mut self, other: &WorkerStatistics) {
        self.elapsed_time = self.elapsed_time.max(other.elapsed_time);
        self.expanded += other.expanded;
        self.generated += other.generated;
        self.evaluated += other.evaluated;
        self.dead_ends += other.dead_ends;
        self.reopened += other.reopened;
        self.duplicates += other.duplicates;
        self.pruned_by_incumbent += other.pruned_by_incumbent;
        self.goals_found += other.goals_found;
        self.nodes_sent += other.nodes_sent;
        self.nodes_received += other.nodes_received;
        self.batches_sent += other.batches_sent;
        self.incumbent_messages += other.incumbent_messages;
        self.termination_messages += other.termination_messages;
        self.plan_messages += other.plan_messages;
        self.protocol_errors += other.protocol_errors;
        self.registered_states += other.registered_states;
        self.frontier_high_water = self.frontier_high_water.max(other.frontier_high_water);
    }

    /// Share of generated successors that were sent to another worker.
    pub fn remote_ratio(&self) -> f64 {
        if self.generated == 0 {
            0.0
        } else {
            self.nodes_sent as f64 / self.generated as f64
        }
    }

    /// Expansions per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.expanded as f64 / secs
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed_time));
        s.push_str(&format!("Expanded: {}\n", self.expanded));
        s.push_str(&format!("Generated: {}\n", self.generated));
        s.push_str(&format!("Evaluated: {}\n", self.evaluated));
        s.push_str(&format!("Dead ends: {}\n", self.dead_ends));
        s.push_str(&format!("Reopened: {}\n", self.reopened));
        s.push_str(&format!("Duplicates: {}\n", self.duplicates));
        s.push_str(&format!("Pruned by incumbent: {}\n", self.pruned_by_incumbent));
        s.push_str(&format!(
            "Nodes sent: {} ({:.1}% of generated, {} batches)\n",
            self.nodes_sent,
            self.remote_ratio() * 100.0,
            self.batches_sent
        ));
        s.push_str(&format!("Nodes received: {}\n", self.nodes_received));
        s.push_str(&format!(
            "Control messages: {} incumbent, {} termination, {} plan\n",
            self.incumbent_messages, self.termination_messages, self.plan_messages
        ));
        if self.protocol_errors > 0 {
            s.push_str(&format!("Protocol errors: {}\n", self.protocol_errors));
        }
        s.push_str(&format!("Registered states: {}\n", self.registered_states));
        s.push_str(&format!("Frontier high water: {}\n", self.frontier_high_water));
        if self.expanded > 0 {
            s.push_str(&format!("Throughput: {:.0} expansions/sec\n", self.throughput()));
        }
        s
    }
}

/// What a worker reports when it finishes.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub rank: usize,
    /// Set on the worker that completed plan reconstruction.
    pub plan: Option<Plan>,
    /// Incumbent cost as seen by this worker at termination.
    pub incumbent: Option<i32>,
    pub statistics: WorkerStatistics,
}

/// Result of a distributed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub plan: Option<Plan>,
    /// Best goal cost known at termination.
    pub incumbent: Option<i32>,
    /// The run was stopped externally before termination was detected.
    pub aborted: bool,
    pub worker_statistics: Vec<WorkerStatistics>,
    pub total_statistics: WorkerStatistics,
}

impl SearchResult {
    pub fn from_outcomes(mut outcomes: Vec<WorkerOutcome>, aborted: bool) -> Self {
        outcomes.sort_by_key(|o| o.rank);
        let plan = outcomes.iter().find_map(|o| o.plan.clone());
        let incumbent = outcomes.iter().filter_map(|o| o.incumbent).min();
        let mut total_statistics = WorkerStatistics::default();
        for outcome in &outcomes {
            total_statistics.absorb(&outcome.statistics);
        }
        Self {
            plan,
            incumbent,
            aborted,
            worker_statistics: outcomes.into_iter().map(|o| o.statistics).collect(),
            total_statistics,
        }
    }

    pub fn solved(&self) -> bool {
        self.plan.is_some()
    }

    /// Mean expansions over the busiest worker's expansions (1.0 = even).
    pub fn load_balance(&self) -> f64 {
        let max = self
            .worker_statistics
            .iter()
            .map(|s| s.expanded)
            .max()
            .unwrap_or(0);
        if max == 0 {
            return 1.0;
        }
        let n = self.worker_statistics.len() as f64;
        self.total_statistics.expanded as f64 / (n * max as f64)
    }

    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        match &self.plan {
            Some(plan) => s.push_str(&format!(
                "Solution found: {} steps, cost {}\n",
                plan.len(),
                plan.cost
            )),
            None if self.aborted => s.push_str("Search aborted before termination\n"),
            None => s.push_str("No solution\n"),
        }
        s.push_str(&format!("Workers: {}\n", self.worker_statistics.len()));
        s.push_str(&format!("Load balance: {:.2}\n", self.load_balance()));
        s.push_str(&self.total_statistics.format_summary());
        s
    }
}
