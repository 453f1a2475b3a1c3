//! Domain-transition graphs and weighted transition matrices.

use super::{Task, Value};

/// Successor lists of one variable's domain-transition graph. Self loops are
/// not represented; successor lists are sorted and duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTransitionGraph {
    successors: Vec<Vec<Value>>,
}

impl DomainTransitionGraph {
    /// Build the graph of `var` from the operators of `task`. An effect
    /// without a precondition on `var` induces an edge from every other value.
    pub fn build(task: &Task, var: usize) -> Self {
        let size = task.domain_size(var);
        let mut successors: Vec<Vec<Value>> = vec![Vec::new(); size];
        for effect in task
            .operators
            .iter()
            .flat_map(|op| op.effects.iter())
            .filter(|e| e.var == var)
        {
            match effect.pre {
                Some(pre) if pre != effect.post => successors[pre as usize].push(effect.post),
                Some(_) => {}
                None => {
                    for from in (0..size).filter(|&v| v != effect.post as usize) {
                        successors[from].push(effect.post);
                    }
                }
            }
        }
        for list in &mut successors {
            list.sort_unstable();
            list.dedup();
        }
        Self { successors }
    }

    pub fn build_all(task: &Task) -> Vec<Self> {
        (0..task.num_vars()).map(|var| Self::build(task, var)).collect()
    }

    pub fn size(&self) -> usize {
        self.successors.len()
    }

    pub fn successors(&self, value: Value) -> &[Value] {
        &self.successors[value as usize]
    }

    pub fn out_degree(&self, value: Value) -> usize {
        self.successors[value as usize].len()
    }

    /// Number of edges `from -> value` over all `from`.
    pub fn in_degree(&self, value: Value) -> usize {
        self.successors
            .iter()
            .filter(|list| list.binary_search(&value).is_ok())
            .count()
    }

    pub fn has_edge(&self, from: Value, to: Value) -> bool {
        self.successors[from as usize].binary_search(&to).is_ok()
    }
}

/// Policy for weighting the edges of a transition matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeWeight {
    /// 1.0 per domain-transition edge, plus 1.0 self loops.
    #[default]
    UnitCost,
    /// Counts of grounded operators inducing each transition, including
    /// prevail conditions and untouched variables as self loops.
    GroundAction,
}

impl std::fmt::Display for EdgeWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeWeight::UnitCost => write!(f, "unit_cost"),
            EdgeWeight::GroundAction => write!(f, "ground_action"),
        }
    }
}

impl std::str::FromStr for EdgeWeight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "unit_cost" | "unit" => Ok(EdgeWeight::UnitCost),
            "ground_action" | "ground" => Ok(EdgeWeight::GroundAction),
            _ => Err(format!(
                "Unknown edge weight: '{}'. Valid options: unit_cost, ground_action",
                s
            )),
        }
    }
}

/// Dense weighted adjacency matrix over one variable's domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    size: usize,
    weights: Vec<f64>,
}

impl TransitionMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            weights: vec![0.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.weights[from * self.size + to]
    }

    pub fn add(&mut self, from: usize, to: usize, weight: f64) {
        self.weights[from * self.size + to] += weight;
    }

    pub fn set(&mut self, from: usize, to: usize, weight: f64) {
        self.weights[from * self.size + to] = weight;
    }

    /// Build one matrix per variable of `task` under the given policy.
    pub fn build_all(task: &Task, policy: EdgeWeight) -> Vec<Self> {
        match policy {
            EdgeWeight::UnitCost => DomainTransitionGraph::build_all(task)
                .iter()
                .map(Self::unit_cost)
                .collect(),
            EdgeWeight::GroundAction => Self::ground_action(task),
        }
    }

    fn unit_cost(graph: &DomainTransitionGraph) -> Self {
        let mut matrix = Self::zeros(graph.size());
        for from in 0..graph.size() {
            for &to in graph.successors(from as Value) {
                matrix.set(from, to as usize, 1.0);
            }
            matrix.set(from, from, 1.0);
        }
        matrix
    }

    fn ground_action(task: &Task) -> Vec<Self> {
        let domains = task.domain_sizes();
        let mut matrices: Vec<Self> = domains.iter().map(|&d| Self::zeros(d)).collect();
        for op in &task.operators {
            let mut touched = vec![false; domains.len()];
            for prevail in &op.prevail {
                touched[prevail.var] = true;
                for k in 0..domains[prevail.var] {
                    matrices[prevail.var].add(k, prevail.value as usize, 1.0);
                }
            }
            for effect in &op.effects {
                touched[effect.var] = true;
                match effect.pre {
                    Some(pre) => matrices[effect.var].add(pre as usize, effect.post as usize, 1.0),
                    None => {
                        for k in 0..domains[effect.var] {
                            matrices[effect.var].add(k, effect.post as usize, 1.0);
                        }
                    }
                }
            }
            for (var, _) in touched.iter().enumerate().filter(|(_, t)| !**t) {
                for k in 0..domains[var] {
                    matrices[var].add(k, k, 1.0);
                }
            }
        }
        matrices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Effect, Fact, Operator, Variable};

    fn cycle_task() -> Task {
        // var 0 cycles 0 -> 1 -> 2 -> 0; var 1 is reset from anywhere.
        let step = |name: &str, from: Value, to: Value| Operator {
            name: name.into(),
            cost: 1,
            prevail: vec![Fact::new(1, 0)],
            effects: vec![Effect {
                var: 0,
                pre: Some(from),
                post: to,
                conditions: vec![],
            }],
        };
        Task {
            variables: vec![
                Variable {
                    name: "pos".into(),
                    domain: 3,
                },
                Variable {
                    name: "flag".into(),
                    domain: 2,
                },
            ],
            operators: vec![
                step("a", 0, 1),
                step("b", 1, 2),
                step("c", 2, 0),
                Operator {
                    name: "reset".into(),
                    cost: 1,
                    prevail: vec![],
                    effects: vec![Effect {
                        var: 1,
                        pre: None,
                        post: 0,
                        conditions: vec![],
                    }],
                },
            ],
            initial: vec![0, 1],
            goal: vec![],
        }
    }

    #[test]
    fn test_dtg_successors() {
        let task = cycle_task();
        let g = DomainTransitionGraph::build(&task, 0);
        assert_eq!(g.successors(0), &[1]);
        assert_eq!(g.successors(2), &[0]);
        assert_eq!(g.in_degree(0), 1);

        let flag = DomainTransitionGraph::build(&task, 1);
        assert_eq!(flag.successors(1), &[0]);
        assert!(flag.successors(0).is_empty());
    }

    #[test]
    fn test_unit_cost_matrix() {
        let task = cycle_task();
        let matrices = TransitionMatrix::build_all(&task, EdgeWeight::UnitCost);
        let m = &matrices[0];
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.get(2, 2), 1.0);
    }

    #[test]
    fn test_ground_action_matrix() {
        let task = cycle_task();
        let matrices = TransitionMatrix::build_all(&task, EdgeWeight::GroundAction);
        // flag: three step operators prevail on flag=0 (3 per source value),
        // reset adds one edge from each value to 0.
        assert_eq!(matrices[1].get(0, 0), 4.0);
        assert_eq!(matrices[1].get(1, 0), 4.0);
        // pos: reset does not touch it, giving one self loop per value.
        assert_eq!(matrices[0].get(0, 0), 1.0);
        assert_eq!(matrices[0].get(0, 1), 1.0);
    }

    #[test]
    fn test_edge_weight_from_str() {
        assert_eq!("unit_cost".parse::<EdgeWeight>().unwrap(), EdgeWeight::UnitCost);
        assert_eq!(
            "ground-action".parse::<EdgeWeight>().unwrap(),
            EdgeWeight::GroundAction
        );
        assert!("bogus".parse::<EdgeWeight>().is_err());
    }
}
