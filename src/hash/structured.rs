//! Construction of abstraction-limited and structured contribution tables.

use super::table::DistributionMap;
use crate::partition::{CutStrategy, Partitioner};
use crate::task::{Task, Value};
use rand::Rng;
use tracing::debug;

/// How an abstraction-limited hash chooses the variables it randomizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbstractionSelection {
    /// Leading variables whose cumulative domain product stays below the
    /// ratio of the whole state space.
    #[default]
    DomainBudget,
    /// The ratio of variables changed by the fewest operators.
    Incidence,
}

impl std::fmt::Display for AbstractionSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbstractionSelection::DomainBudget => write!(f, "domain"),
            AbstractionSelection::Incidence => write!(f, "incidence"),
        }
    }
}

impl std::str::FromStr for AbstractionSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "domain" | "budget" => Ok(AbstractionSelection::DomainBudget),
            "incidence" | "rank" => Ok(AbstractionSelection::Incidence),
            _ => Err(format!(
                "Unknown abstraction selection: '{}'. Valid options: domain, incidence",
                s
            )),
        }
    }
}

/// Leading variables whose cumulative domain-size product stays strictly
/// below `ratio` times the product of all domain sizes. Computed in log
/// space so large tasks do not overflow.
pub fn domain_budget_prefix(domains: &[usize], ratio: f64) -> Vec<usize> {
    if ratio <= 0.0 {
        return Vec::new();
    }
    let total: f64 = domains.iter().map(|&d| (d as f64).ln()).sum();
    let budget = total + ratio.ln();
    let mut cumulative = 0.0;
    let mut selected = Vec::new();
    for (var, &d) in domains.iter().enumerate() {
        cumulative += (d as f64).ln();
        if cumulative + 1e-9 < budget {
            selected.push(var);
        } else {
            break;
        }
    }
    selected
}

/// The `ratio` share of variables with the lowest operator incidence.
pub fn least_incident(task: &Task, ratio: f64) -> Vec<usize> {
    let rank = task.normalized_frequency_rank();
    let mut selected: Vec<usize> = (0..task.num_vars())
        .filter(|&var| rank[var] < ratio)
        .collect();
    selected.sort_unstable();
    selected
}

pub fn abstraction<R: Rng + ?Sized>(
    task: &Task,
    ratio: f64,
    selection: AbstractionSelection,
    rng: &mut R,
) -> DistributionMap {
    let domains = task.domain_sizes();
    let selected = match selection {
        AbstractionSelection::DomainBudget => domain_budget_prefix(&domains, ratio),
        AbstractionSelection::Incidence => least_incident(task, ratio),
    };
    debug!(?selected, "abstraction randomizes variables");
    let mut map = DistributionMap::zeros(&domains);
    for var in selected {
        map.randomize_var(var, rng);
    }
    map
}

/// Greedy-cut groups share one contribution; the domain-budget prefix is
/// then re-randomized value by value.
pub fn feature_structured<R: Rng + ?Sized>(task: &Task, ratio: f64, rng: &mut R) -> DistributionMap {
    let domains = task.domain_sizes();
    let partitioner = Partitioner::new(task, CutStrategy::Greedy);
    let mut map = DistributionMap::zeros(&domains);
    for var in 0..domains.len() {
        let cut = partitioner.cut(var, rng);
        for group in &cut.groups {
            map.share(var, group, rng);
        }
    }
    for var in domain_budget_prefix(&domains, ratio) {
        map.randomize_var(var, rng);
    }
    map
}

/// Plain tables with greedy-cut groups on the leading non-binary variables
/// whose cumulative (additive) domain size stays within `ratio` of the sum
/// of all domain sizes.
pub fn feature_action<R: Rng + ?Sized>(task: &Task, ratio: f64, rng: &mut R) -> DistributionMap {
    let domains = task.domain_sizes();
    let mut map = DistributionMap::random(&domains, rng);
    let partitioner = Partitioner::new(task, CutStrategy::Greedy);
    let whole = 1 + domains.iter().sum::<usize>();
    let budget = (whole as f64 * ratio) as usize;
    let mut current = 1;
    for (var, &d) in domains.iter().enumerate() {
        if d <= 2 {
            continue;
        }
        current += d;
        if current > budget {
            break;
        }
        for group in &partitioner.cut(var, rng).groups {
            map.share(var, group, rng);
        }
    }
    map
}

/// Plain tables adjusted so that, for up to `ratio` × |operators| randomly
/// drawn operators, the contributions of all (variable, value) pairs named
/// by the operator's effects XOR to zero.
///
/// Every effect is treated as changing its variable; effects that leave a
/// value untouched break the cancellation for that state.
pub fn action_structured<R: Rng + ?Sized>(
    task: &Task,
    ratio: f64,
    max_failures: usize,
    rng: &mut R,
) -> DistributionMap {
    let domains = task.domain_sizes();
    let mut map = DistributionMap::random(&domains, rng);
    if task.operators.is_empty() {
        return map;
    }
    let budget = (task.operators.len() as f64 * ratio) as usize;
    let mut fixed: Vec<Vec<bool>> = domains.iter().map(|&d| vec![false; d]).collect();
    let mut successes = 0;
    let mut failures = 0;

    while successes < budget && failures < max_failures {
        let op = &task.operators[rng.random_range(0..task.operators.len())];
        let mut pairs: Vec<(usize, Value)> = Vec::with_capacity(op.effects.len() * 2);
        for effect in &op.effects {
            pairs.push((effect.var, effect.post));
            if let Some(pre) = effect.pre {
                pairs.push((effect.var, pre));
            }
        }

        let free = pairs
            .iter()
            .position(|&(var, value)| !fixed[var][value as usize]);
        match free {
            Some(i) => {
                let balance = pairs
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .fold(0u32, |acc, (_, &(var, value))| acc ^ map.contribution(var, value));
                let (var, value) = pairs[i];
                map.set(var, value, balance);
                for &(var, value) in &pairs {
                    fixed[var][value as usize] = true;
                }
                successes += 1;
                failures = 0;
            }
            None => failures += 1,
        }
    }
    debug!(successes, budget, "action-structured tables built");
    map
}
