//! Partitioning of variable domains into value groups.
//!
//! Structured distribution hashes give every value of a group the same
//! contribution, so transitions inside a group never change a state's
//! owner. The partitioner chooses groups that keep frequent transitions
//! inside a group while cutting the domain into comparable parts.

pub mod sparsity;

use crate::task::{DomainTransitionGraph, EdgeWeight, Task, TransitionMatrix, Value};
use rand::Rng;
use tracing::debug;

pub use sparsity::{Sparsity, SPARSITY_EPSILON};

/// Result of cutting one variable's domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cut {
    /// Pairwise disjoint value groups, each sorted.
    pub groups: Vec<Vec<Value>>,
    /// Values left out of every group. They keep a zero contribution and
    /// therefore collide with each other.
    pub dropped: Vec<Value>,
}

impl Cut {
    /// All values covered by the cut, groups first.
    pub fn covered(&self) -> impl Iterator<Item = Value> + '_ {
        self.groups.iter().flatten().chain(self.dropped.iter()).copied()
    }
}

/// Flips per domain value of the default random-updating strategy.
pub const DEFAULT_UPDATE_FACTOR: usize = 10;

/// Strategy for cutting a domain-transition graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutStrategy {
    /// Greedy connectivity growth of two groups; the rest is dropped.
    Greedy,
    /// Random 2-coloring improved by single-value flips that strictly lower
    /// the sparsity objective.
    RandomUpdating {
        /// Number of flips per domain value.
        update_factor: usize,
        sparsity: Sparsity,
        /// Never accept a coloring that puts every value in one group.
        always_cut: bool,
        edge_weight: EdgeWeight,
    },
}

impl Default for CutStrategy {
    fn default() -> Self {
        Self::random_updating()
    }
}

impl CutStrategy {
    pub fn random_updating() -> Self {
        CutStrategy::RandomUpdating {
            update_factor: DEFAULT_UPDATE_FACTOR,
            sparsity: Sparsity::default(),
            always_cut: false,
            edge_weight: EdgeWeight::default(),
        }
    }
}

impl std::fmt::Display for CutStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CutStrategy::Greedy => write!(f, "two_groups_and_rest"),
            CutStrategy::RandomUpdating {
                update_factor,
                sparsity,
                always_cut,
                edge_weight,
            } => write!(
                f,
                "random_updating({},{},{},{})",
                update_factor, sparsity, always_cut, edge_weight
            ),
        }
    }
}

/// Split `args` on commas that are not nested inside parentheses.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(args[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

impl std::str::FromStr for CutStrategy {
    type Err = String;

    /// Accepts `two_groups_and_rest` (alias `greedy`) and
    /// `random_updating[(update, sparsity, always_cut, edge_weight)]`
    /// (alias `random`) with trailing arguments optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        let (name, args) = match normalized.find('(') {
            Some(open) => {
                let inner = normalized[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| format!("Missing ')' in '{}'", s))?;
                (&normalized[..open], split_top_level(inner))
            }
            None => (normalized.as_str(), Vec::new()),
        };
        match name {
            "two_groups_and_rest" | "greedy" if args.is_empty() => Ok(CutStrategy::Greedy),
            "random_updating" | "random" => {
                let mut update_factor = DEFAULT_UPDATE_FACTOR;
                let mut sparsity = Sparsity::default();
                let mut always_cut = false;
                let mut edge_weight = EdgeWeight::default();
                if args.len() > 4 {
                    return Err(format!("random_updating takes at most 4 arguments: '{}'", s));
                }
                if let Some(a) = args.first() {
                    update_factor = a
                        .parse()
                        .map_err(|e| format!("Invalid update factor '{}': {}", a, e))?;
                }
                if let Some(a) = args.get(1) {
                    sparsity = a.parse()?;
                }
                if let Some(a) = args.get(2) {
                    always_cut = a
                        .parse()
                        .map_err(|e| format!("Invalid always_cut '{}': {}", a, e))?;
                }
                if let Some(a) = args.get(3) {
                    edge_weight = a.parse()?;
                }
                Ok(CutStrategy::RandomUpdating {
                    update_factor,
                    sparsity,
                    always_cut,
                    edge_weight,
                })
            }
            _ => Err(format!(
                "Unknown cut strategy: '{}'. Valid options: two_groups_and_rest, random_updating",
                s
            )),
        }
    }
}

/// Cuts the variables of one task with a fixed strategy.
#[derive(Debug, Clone)]
pub struct Partitioner {
    strategy: CutStrategy,
    graphs: Vec<DomainTransitionGraph>,
    matrices: Vec<TransitionMatrix>,
}

impl Partitioner {
    pub fn new(task: &Task, strategy: CutStrategy) -> Self {
        let graphs = DomainTransitionGraph::build_all(task);
        let matrices = match strategy {
            CutStrategy::RandomUpdating { edge_weight, .. } => {
                TransitionMatrix::build_all(task, edge_weight)
            }
            CutStrategy::Greedy => Vec::new(),
        };
        Self {
            strategy,
            graphs,
            matrices,
        }
    }

    pub fn strategy(&self) -> CutStrategy {
        self.strategy
    }

    /// Partition the domain of `var`.
    pub fn cut<R: Rng + ?Sized>(&self, var: usize, rng: &mut R) -> Cut {
        let cut = match self.strategy {
            CutStrategy::Greedy => greedy_cut(&self.graphs[var]),
            CutStrategy::RandomUpdating {
                update_factor,
                sparsity,
                always_cut,
                ..
            } => random_updating_cut(
                &self.matrices[var],
                update_factor,
                sparsity,
                always_cut,
                rng,
            ),
        };
        debug!(var, groups = ?cut.groups, dropped = ?cut.dropped, "cut domain");
        cut
    }
}

/// First candidate with the highest positive score.
fn most_connected(
    candidates: impl Iterator<Item = Value>,
    score: impl Fn(Value) -> usize,
) -> Option<Value> {
    let mut best: Option<(Value, usize)> = None;
    for p in candidates {
        let c = score(p);
        if c > best.map_or(0, |(_, s)| s) {
            best = Some((p, c));
        }
    }
    best.map(|(p, _)| p)
}

fn edges_from(graph: &DomainTransitionGraph, group: &[Value], to: Value) -> usize {
    group.iter().filter(|&&q| graph.has_edge(q, to)).count()
}

fn greedy_cut(graph: &DomainTransitionGraph) -> Cut {
    let size = graph.size();
    let mut assigned = vec![false; size];

    let seed = (0..size as Value)
        .min_by_key(|&p| graph.in_degree(p) + graph.out_degree(p))
        .unwrap_or(0);
    let mut first = vec![seed];
    assigned[seed as usize] = true;

    while first.len() < size / 2 {
        let unassigned = (0..size as Value).filter(|&p| !assigned[p as usize]);
        let Some(next) = most_connected(unassigned, |p| {
            edges_from(graph, &first, p) + graph.out_degree(p)
        }) else {
            break;
        };
        first.push(next);
        assigned[next as usize] = true;
    }
    first.sort_unstable();

    let Some(default_seed) = (0..size as Value).find(|&p| !assigned[p as usize]) else {
        return Cut {
            groups: vec![first],
            dropped: Vec::new(),
        };
    };
    let unassigned = (0..size as Value).filter(|&p| !assigned[p as usize]);
    let seed = most_connected(unassigned, |p| {
        edges_from(graph, &first, p) + graph.out_degree(p)
    })
    .unwrap_or(default_seed);
    let mut second = vec![seed];
    assigned[seed as usize] = true;

    while first.len() + second.len() < size {
        let unassigned = (0..size as Value).filter(|&p| !assigned[p as usize]);
        let Some(next) = most_connected(unassigned, |p| {
            let inside = graph
                .successors(p)
                .iter()
                .filter(|q| second.contains(q))
                .count();
            edges_from(graph, &second, p) + inside
        }) else {
            break;
        };
        second.push(next);
        assigned[next as usize] = true;
    }
    second.sort_unstable();

    let mut groups = vec![first];
    let mut dropped = Vec::new();
    if second.len() > 1 {
        groups.push(second);
    } else {
        dropped.extend(second);
    }
    dropped.extend((0..size as Value).filter(|&p| !assigned[p as usize]));
    dropped.sort_unstable();
    Cut { groups, dropped }
}

fn random_updating_cut<R: Rng + ?Sized>(
    matrix: &TransitionMatrix,
    update_factor: usize,
    sparsity: Sparsity,
    always_cut: bool,
    rng: &mut R,
) -> Cut {
    let size = matrix.size();
    let mut coloring: Vec<bool> = (0..size).map(|_| rng.random_bool(0.5)).collect();
    if always_cut && size > 1 && coloring.iter().all(|&c| c == coloring[0]) {
        let node = rng.random_range(0..size);
        coloring[node] = !coloring[node];
    }
    let mut incumbent = sparsity.evaluate(matrix, &coloring);

    for _ in 0..size * update_factor {
        let node = rng.random_range(0..size);
        coloring[node] = !coloring[node];
        let single_color = coloring.iter().all(|&c| c == coloring[0]);
        if always_cut && single_color {
            coloring[node] = !coloring[node];
            continue;
        }
        let value = sparsity.evaluate(matrix, &coloring);
        if value < incumbent {
            incumbent = value;
        } else {
            coloring[node] = !coloring[node];
        }
    }
    debug!(sparsity = %sparsity, value = incumbent, "random updating finished");

    let (ones, zeros): (Vec<Value>, Vec<Value>) =
        (0..size as Value).partition(|&p| coloring[p as usize]);
    Cut {
        groups: [ones, zeros].into_iter().filter(|g| !g.is_empty()).collect(),
        dropped: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Effect, Operator, Variable};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn move_op(var: usize, from: Value, to: Value) -> Operator {
        Operator {
            name: format!("move-{}-{}-{}", var, from, to),
            cost: 1,
            prevail: vec![],
            effects: vec![Effect {
                var,
                pre: Some(from),
                post: to,
                conditions: vec![],
            }],
        }
    }

    /// One variable whose DTG is two bidirectional triangles {0,1,2} and
    /// {3,4,5} joined by the edge 2 -> 3.
    fn two_triangles() -> Task {
        let mut operators = Vec::new();
        for (a, b) in [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
            operators.push(move_op(0, a, b));
            operators.push(move_op(0, b, a));
        }
        operators.push(move_op(0, 2, 3));
        Task {
            variables: vec![Variable {
                name: "room".into(),
                domain: 6,
            }],
            operators,
            initial: vec![0],
            goal: vec![],
        }
    }

    fn assert_partition(cut: &Cut, size: usize) {
        let mut covered: Vec<Value> = cut.covered().collect();
        covered.sort_unstable();
        let expected: Vec<Value> = (0..size as Value).collect();
        assert_eq!(covered, expected, "cut {:?} is not a partition", cut);
    }

    #[test]
    fn test_greedy_cut_is_partition() {
        let task = two_triangles();
        let partitioner = Partitioner::new(&task, CutStrategy::Greedy);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cut = partitioner.cut(0, &mut rng);
        assert_partition(&cut, 6);
        assert!(!cut.groups.is_empty());
        assert!(cut.groups[0].len() >= 3);
    }

    #[test]
    fn test_greedy_cut_isolated_values_dropped() {
        // Values 2 and 3 have no transitions at all.
        let task = Task {
            variables: vec![Variable {
                name: "v".into(),
                domain: 4,
            }],
            operators: vec![move_op(0, 0, 1), move_op(0, 1, 0)],
            initial: vec![0],
            goal: vec![],
        };
        let cut = Partitioner::new(&task, CutStrategy::Greedy).cut(0, &mut ChaCha8Rng::seed_from_u64(0));
        assert_partition(&cut, 4);
        assert_eq!(cut.groups, vec![vec![0, 2]]);
        assert_eq!(cut.dropped, vec![1, 3]);
    }

    #[test]
    fn test_greedy_cut_single_value_domain() {
        let task = Task {
            variables: vec![Variable {
                name: "const".into(),
                domain: 1,
            }],
            operators: vec![],
            initial: vec![0],
            goal: vec![],
        };
        let cut = Partitioner::new(&task, CutStrategy::Greedy).cut(0, &mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(cut.groups, vec![vec![0]]);
        assert!(cut.dropped.is_empty());
    }

    #[test]
    fn test_random_updating_finds_triangles() {
        let task = two_triangles();
        let strategy = CutStrategy::RandomUpdating {
            update_factor: 50,
            sparsity: Sparsity::CutOverGraphSizes,
            always_cut: true,
            edge_weight: EdgeWeight::UnitCost,
        };
        let partitioner = Partitioner::new(&task, strategy);
        let mut rng = ChaCha8Rng::seed_from_u64(717);
        let cut = partitioner.cut(0, &mut rng);
        assert_partition(&cut, 6);
        assert_eq!(cut.groups.len(), 2);
        let mut groups = cut.groups.clone();
        groups.sort();
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_random_updating_is_seeded() {
        let task = two_triangles();
        let partitioner = Partitioner::new(&task, CutStrategy::random_updating());
        let a = partitioner.cut(0, &mut ChaCha8Rng::seed_from_u64(9));
        let b = partitioner.cut(0, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cut_strategy_from_str() {
        assert_eq!(
            "two_groups_and_rest".parse::<CutStrategy>().unwrap(),
            CutStrategy::Greedy
        );
        assert_eq!(
            "random-updating".parse::<CutStrategy>().unwrap(),
            CutStrategy::random_updating()
        );
        assert!("metis".parse::<CutStrategy>().is_err());
        assert!("random_updating(x)".parse::<CutStrategy>().is_err());
    }

    #[test]
    fn test_cut_strategy_round_trip() {
        let strategy = CutStrategy::RandomUpdating {
            update_factor: 50,
            sparsity: Sparsity::EstimatedEfficiency {
                cut_weight: 0.75,
                balance_weight: 0.25,
            },
            always_cut: true,
            edge_weight: EdgeWeight::GroundAction,
        };
        let shown = strategy.to_string();
        assert_eq!(
            shown,
            "random_updating(50,estimated_efficiency(0.75,0.25),true,ground_action)"
        );
        assert_eq!(shown.parse::<CutStrategy>().unwrap(), strategy);

        let partial: CutStrategy = "random(25)".parse().unwrap();
        assert!(matches!(
            partial,
            CutStrategy::RandomUpdating {
                update_factor: 25,
                always_cut: false,
                ..
            }
        ));
    }
}
