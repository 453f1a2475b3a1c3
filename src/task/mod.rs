//! Finite-domain planning task representation.
//!
//! A [`Task`] is an already-grounded multi-valued planning problem: a list of
//! variables with finite domains, operators with prevail conditions and
//! (possibly conditional) effects, an initial state and a partial goal.
//! Tasks are loaded from JSON and validated once before search.

pub mod dtg;
pub mod registry;

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use dtg::{DomainTransitionGraph, EdgeWeight, TransitionMatrix};
pub use registry::{StateId, StateRegistry};

/// A single domain value.
pub type Value = u16;

/// Index of an operator in [`Task::operators`].
pub type OperatorId = usize;

/// Serialized width of a [`Value`] in node records.
pub const VALUE_WIDTH: usize = std::mem::size_of::<Value>();

/// Largest supported domain. Its size, not only its values, must fit in a
/// [`Value`] so that value ranges `0..size` can be written in that type.
pub const MAX_DOMAIN: usize = Value::MAX as usize;

/// A finite-domain state variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Number of values in the domain; values are `0..domain`.
    pub domain: usize,
}

/// An assignment `var = value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub var: usize,
    pub value: Value,
}

impl Fact {
    pub fn new(var: usize, value: Value) -> Self {
        Self { var, value }
    }

    pub fn holds(&self, state: &[Value]) -> bool {
        state[self.var] == self.value
    }
}

/// An effect `var := post`, optionally requiring `var == pre` and guarded by
/// effect conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub var: usize,
    #[serde(default)]
    pub pre: Option<Value>,
    pub post: Value,
    #[serde(default)]
    pub conditions: Vec<Fact>,
}

impl Effect {
    /// Whether this effect fires when its operator is applied in `state`.
    pub fn fires(&self, state: &[Value]) -> bool {
        self.conditions.iter().all(|c| c.holds(state))
    }
}

/// A grounded operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default = "default_cost")]
    pub cost: i32,
    #[serde(default)]
    pub prevail: Vec<Fact>,
    pub effects: Vec<Effect>,
}

fn default_cost() -> i32 {
    1
}

impl Operator {
    pub fn is_applicable(&self, state: &[Value]) -> bool {
        self.prevail.iter().all(|f| f.holds(state))
            && self
                .effects
                .iter()
                .all(|e| e.pre.map_or(true, |pre| state[e.var] == pre))
    }

    /// Variables whose value changes when applying this operator to
    /// `state`, with their new value. When two firing effects touch the same
    /// variable the later one wins.
    pub fn changes(&self, state: &[Value]) -> Vec<(usize, Value)> {
        let mut changes: Vec<(usize, Value)> = Vec::with_capacity(self.effects.len());
        for effect in self.effects.iter().filter(|e| e.fires(state)) {
            match changes.iter_mut().find(|(var, _)| *var == effect.var) {
                Some(slot) => slot.1 = effect.post,
                None => changes.push((effect.var, effect.post)),
            }
        }
        changes.retain(|&(var, post)| state[var] != post);
        changes
    }

    /// Successor state. The caller guarantees applicability.
    pub fn apply(&self, state: &[Value]) -> Vec<Value> {
        let mut next = state.to_vec();
        for (var, post) in self.changes(state) {
            next[var] = post;
        }
        next
    }

    /// Variables this operator has an effect on.
    pub fn affected_vars(&self) -> impl Iterator<Item = usize> + '_ {
        self.effects.iter().map(|e| e.var)
    }
}

/// A grounded finite-domain planning task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub variables: Vec<Variable>,
    pub operators: Vec<Operator>,
    pub initial: Vec<Value>,
    pub goal: Vec<Fact>,
}

impl Task {
    /// Load and validate a task from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let text = std::fs::read_to_string(path).map_err(|source| TaskError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a task from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TaskError> {
        let task: Task = serde_json::from_str(text)?;
        task.validate()?;
        Ok(task)
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn domain_size(&self, var: usize) -> usize {
        self.variables[var].domain
    }

    pub fn domain_sizes(&self) -> Vec<usize> {
        self.variables.iter().map(|v| v.domain).collect()
    }

    /// Check that every variable and value reference is in range.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.variables.len() > i32::MAX as usize {
            return Err(TaskError::TooManyVariables(self.variables.len()));
        }
        for (var, variable) in self.variables.iter().enumerate() {
            if variable.domain == 0 {
                return Err(TaskError::EmptyDomain {
                    var,
                    name: variable.name.clone(),
                });
            }
            if variable.domain > MAX_DOMAIN {
                return Err(TaskError::DomainTooLarge {
                    var,
                    name: variable.name.clone(),
                    domain: variable.domain,
                });
            }
        }
        if self.initial.len() != self.variables.len() {
            return Err(TaskError::InitialArity {
                expected: self.variables.len(),
                found: self.initial.len(),
            });
        }
        for (var, &value) in self.initial.iter().enumerate() {
            self.check_value("initial state", var, value)?;
        }
        for fact in &self.goal {
            self.check_fact("goal", fact)?;
        }
        for op in &self.operators {
            if op.cost < 0 {
                return Err(TaskError::NegativeCost(op.name.clone()));
            }
            let context = format!("operator {}", op.name);
            for fact in &op.prevail {
                self.check_fact(&context, fact)?;
            }
            for effect in &op.effects {
                self.check_var(&context, effect.var)?;
                if let Some(pre) = effect.pre {
                    self.check_value(&context, effect.var, pre)?;
                }
                self.check_value(&context, effect.var, effect.post)?;
                for fact in &effect.conditions {
                    self.check_fact(&context, fact)?;
                }
            }
        }
        Ok(())
    }

    fn check_var(&self, context: &str, var: usize) -> Result<(), TaskError> {
        if var >= self.variables.len() {
            return Err(TaskError::UnknownVariable {
                context: context.to_string(),
                var,
                num_vars: self.variables.len(),
            });
        }
        Ok(())
    }

    fn check_value(&self, context: &str, var: usize, value: Value) -> Result<(), TaskError> {
        self.check_var(context, var)?;
        let domain = self.variables[var].domain;
        if value as usize >= domain {
            return Err(TaskError::ValueOutOfRange {
                context: context.to_string(),
                var,
                value,
                domain,
            });
        }
        Ok(())
    }

    fn check_fact(&self, context: &str, fact: &Fact) -> Result<(), TaskError> {
        self.check_value(context, fact.var, fact.value)
    }

    pub fn is_goal(&self, state: &[Value]) -> bool {
        self.goal.iter().all(|f| f.holds(state))
    }

    /// All operators applicable in `state`, in index order.
    pub fn applicable_operators(&self, state: &[Value]) -> Vec<OperatorId> {
        self.operators
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_applicable(state))
            .map(|(id, _)| id)
            .collect()
    }

    /// Total cost of `plan`.
    pub fn plan_cost(&self, plan: &[OperatorId]) -> Result<i32, TaskError> {
        plan.iter().try_fold(0i32, |total, &op| {
            let op = self
                .operators
                .get(op)
                .ok_or(TaskError::UnknownOperator(op))?;
            total.checked_add(op.cost).ok_or(TaskError::CostOverflow)
        })
    }

    /// Whether `state` assigns every variable a value inside its domain.
    pub fn is_valid_state(&self, state: &[Value]) -> bool {
        state.len() == self.variables.len()
            && state
                .iter()
                .zip(&self.variables)
                .all(|(&value, variable)| (value as usize) < variable.domain)
    }

    /// Replay `plan` from the initial state and check that it reaches a goal.
    pub fn validate_plan(&self, plan: &[OperatorId]) -> bool {
        let mut state = self.initial.clone();
        for &op_id in plan {
            let Some(op) = self.operators.get(op_id) else {
                return false;
            };
            if !op.is_applicable(&state) {
                return false;
            }
            state = op.apply(&state);
        }
        self.is_goal(&state)
    }

    /// Number of operators with an effect on each variable.
    pub fn operator_incidence(&self) -> Vec<usize> {
        let mut incidence = vec![0; self.num_vars()];
        for op in &self.operators {
            let mut touched: Vec<usize> = op.affected_vars().collect();
            touched.sort_unstable();
            touched.dedup();
            for var in touched {
                incidence[var] += 1;
            }
        }
        incidence
    }

    /// Frequency rank of each variable normalized to `[0, 1)`: position in
    /// ascending order of operator incidence (ties by variable index)
    /// divided by the number of variables.
    pub fn normalized_frequency_rank(&self) -> Vec<f64> {
        let n = self.num_vars();
        let incidence = self.operator_incidence();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&var| (incidence[var], var));
        let mut rank = vec![0.0; n];
        for (position, var) in order.into_iter().enumerate() {
            rank[var] = position as f64 / n as f64;
        }
        rank
    }
}
