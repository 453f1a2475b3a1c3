//! Heuristic evaluators consumed by the search engine.

use crate::task::{Task, Value};

/// Outcome of evaluating a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Estimated remaining cost.
    Value(i32),
    /// No goal is reachable from the state.
    DeadEnd,
}

/// A state evaluator. Each worker owns its own instance.
pub trait Heuristic: Send {
    fn evaluate(&mut self, task: &Task, state: &[Value]) -> Evaluation;

    fn name(&self) -> &str;
}

/// Zero everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blind;

impl Heuristic for Blind {
    fn evaluate(&mut self, _task: &Task, _state: &[Value]) -> Evaluation {
        Evaluation::Value(0)
    }

    fn name(&self) -> &str {
        "blind"
    }
}

/// Number of unsatisfied goal facts. Not admissible with non-unit costs.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoalCount;

impl Heuristic for GoalCount {
    fn evaluate(&mut self, task: &Task, state: &[Value]) -> Evaluation {
        let unsatisfied = task.goal.iter().filter(|f| !f.holds(state)).count();
        Evaluation::Value(unsatisfied as i32)
    }

    fn name(&self) -> &str {
        "goal-count"
    }
}

/// Heuristic selection for configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeuristicKind {
    #[default]
    Blind,
    GoalCount,
}

impl HeuristicKind {
    pub fn build(self) -> Box<dyn Heuristic> {
        match self {
            HeuristicKind::Blind => Box::new(Blind),
            HeuristicKind::GoalCount => Box::new(GoalCount),
        }
    }
}

impl std::fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeuristicKind::Blind => write!(f, "blind"),
            HeuristicKind::GoalCount => write!(f, "goal-count"),
        }
    }
}

impl std::str::FromStr for HeuristicKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "blind" | "zero" => Ok(HeuristicKind::Blind),
            "goal-count" | "goalcount" | "gc" => Ok(HeuristicKind::GoalCount),
            _ => Err(format!(
                "Unknown heuristic: '{}'. Valid options: blind, goal-count",
                s
            )),
        }
    }
}
