//! Choosing a distribution hash by trial runs.
//!
//! Every candidate is built and run for a bounded number of simulated
//! rounds. A candidate scores
//!
//! ```text
//! efficiency = Σ expanded / (W · max expanded) − communication_weight · nodes_sent / generated
//! ```
//!
//! and the highest score wins, ties going to the earlier candidate.

use crate::error::HashError;
use crate::hash::{DistributionHash, HashConfig, DEFAULT_HASH_SEED};
use crate::search::parallel::sim::{SimConfig, Simulation};
use crate::search::{SearchConfig, SearchResult};
use crate::task::Task;
use std::sync::Arc;
use tracing::info;

/// Limits and weights of a selection trial.
#[derive(Debug, Clone)]
pub struct TrialBudget {
    /// Simulated workers per trial.
    pub workers: usize,
    /// Rounds each trial may run.
    pub rounds: u64,
    /// Weight of the remote ratio against load balance.
    pub communication_weight: f64,
    /// Seed of the simulated network.
    pub seed: u64,
}

impl Default for TrialBudget {
    fn default() -> Self {
        Self {
            workers: 4,
            rounds: 2_000,
            communication_weight: 0.5,
            seed: DEFAULT_HASH_SEED,
        }
    }
}

impl TrialBudget {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_communication_weight(mut self, weight: f64) -> Self {
        self.communication_weight = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of one candidate's trial.
#[derive(Debug, Clone)]
pub struct CandidateTrial {
    pub config: HashConfig,
    pub hash: Arc<DistributionHash>,
    /// Expansions per simulated worker.
    pub expanded: Vec<u64>,
    pub generated: u64,
    pub nodes_sent: u64,
    pub load_balance: f64,
    pub remote_ratio: f64,
    pub efficiency: f64,
    /// The search terminated within the budget.
    pub completed: bool,
}

impl CandidateTrial {
    fn score(
        config: HashConfig,
        hash: Arc<DistributionHash>,
        result: &SearchResult,
        weight: f64,
    ) -> Self {
        let load_balance = result.load_balance();
        let remote_ratio = result.total_statistics.remote_ratio();
        Self {
            config,
            hash,
            expanded: result.worker_statistics.iter().map(|s| s.expanded).collect(),
            generated: result.total_statistics.generated,
            nodes_sent: result.total_statistics.nodes_sent,
            load_balance,
            remote_ratio,
            efficiency: load_balance - weight * remote_ratio,
            completed: !result.aborted,
        }
    }
}

/// All trials, in candidate order, with the index of the winner.
#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub trials: Vec<CandidateTrial>,
    pub best: usize,
}

impl SelectionReport {
    pub fn best_trial(&self) -> Option<&CandidateTrial> {
        self.trials.get(self.best)
    }

    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        for (i, trial) in self.trials.iter().enumerate() {
            s.push_str(&format!(
                "{} {:<32} efficiency {:>7.3}  balance {:.3}  remote {:.3}{}\n",
                if i == self.best { "*" } else { " " },
                trial.config.to_string(),
                trial.efficiency,
                trial.load_balance,
                trial.remote_ratio,
                if trial.completed { "" } else { "  (budget exhausted)" }
            ));
        }
        s
    }
}

/// Build and trial every candidate.
pub fn evaluate_candidates(
    task: &Arc<Task>,
    candidates: &[HashConfig],
    budget: &TrialBudget,
    search_config: &SearchConfig,
) -> Result<SelectionReport, HashError> {
    if candidates.is_empty() {
        return Err(HashError::NoCandidates);
    }

    let mut trials = Vec::with_capacity(candidates.len());
    let mut best = 0;
    let mut best_efficiency = f64::NEG_INFINITY;
    for config in candidates {
        let hash = Arc::new(DistributionHash::build(task, config)?);
        let sim_config = SimConfig::default()
            .with_seed(budget.seed)
            .with_max_rounds(budget.rounds);
        let mut simulation = Simulation::new(
            Arc::clone(task),
            Arc::clone(&hash),
            search_config,
            budget.workers,
            sim_config,
        )
        .map_err(Box::new)?;
        simulation.run_for(budget.rounds);
        let result = simulation.finish();

        let trial =
            CandidateTrial::score(config.clone(), hash, &result, budget.communication_weight);
        info!(
            candidate = %config,
            efficiency = trial.efficiency,
            load_balance = trial.load_balance,
            remote_ratio = trial.remote_ratio,
            completed = trial.completed,
            "candidate trial finished"
        );
        if trial.efficiency > best_efficiency {
            best_efficiency = trial.efficiency;
            best = trials.len();
        }
        trials.push(trial);
    }
    Ok(SelectionReport { trials, best })
}

/// The winning hash of a report.
pub fn select(report: SelectionReport) -> Result<DistributionHash, HashError> {
    let best = report.best;
    let trial = report
        .trials
        .into_iter()
        .nth(best)
        .ok_or(HashError::NoCandidates)?;
    Ok(Arc::try_unwrap(trial.hash).unwrap_or_else(|shared| (*shared).clone()))
}
