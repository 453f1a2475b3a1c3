//! Contribution tables and their combination into a fingerprint.

use super::Fingerprint;
use crate::task::{Operator, Value};
use rand::Rng;

/// Per-variable table of contributions, one entry per domain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionMap {
    tables: Vec<Vec<u32>>,
}

impl DistributionMap {
    /// All-zero tables for the given domain sizes.
    pub fn zeros(domains: &[usize]) -> Self {
        Self {
            tables: domains.iter().map(|&d| vec![0; d]).collect(),
        }
    }

    /// One independent random contribution per (variable, value).
    pub fn random<R: Rng + ?Sized>(domains: &[usize], rng: &mut R) -> Self {
        let mut map = Self::zeros(domains);
        for var in 0..domains.len() {
            map.randomize_var(var, rng);
        }
        map
    }

    /// Use explicit tables.
    pub fn from_tables(tables: Vec<Vec<u32>>) -> Self {
        Self { tables }
    }

    pub fn num_vars(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, var: usize) -> &[u32] {
        &self.tables[var]
    }

    pub fn contribution(&self, var: usize, value: Value) -> u32 {
        self.tables[var][value as usize]
    }

    pub fn set(&mut self, var: usize, value: Value, contribution: u32) {
        self.tables[var][value as usize] = contribution;
    }

    /// Fresh random contribution for every value of `var`.
    pub fn randomize_var<R: Rng + ?Sized>(&mut self, var: usize, rng: &mut R) {
        for slot in &mut self.tables[var] {
            *slot = rng.random();
        }
    }

    /// Give every value in `group` one shared random contribution.
    pub fn share<R: Rng + ?Sized>(&mut self, var: usize, group: &[Value], rng: &mut R) {
        let contribution: u32 = rng.random();
        for &value in group {
            self.set(var, value, contribution);
        }
    }

    /// Whether any value of `var` has a non-zero contribution.
    pub fn is_randomized(&self, var: usize) -> bool {
        self.tables[var].iter().any(|&c| c != 0)
    }
}

/// How per-variable contributions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    Xor,
    /// `r = r * base + contribution` over the randomized variables in order.
    Polynomial { base: u32 },
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Combinator::Xor => write!(f, "xor"),
            Combinator::Polynomial { base } => write!(f, "polynomial({})", base),
        }
    }
}

impl std::str::FromStr for Combinator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if normalized == "xor" {
            return Ok(Combinator::Xor);
        }
        let base = normalized
            .strip_prefix("polynomial(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| {
                format!(
                    "Unknown combinator: '{}'. Valid options: xor, polynomial(BASE)",
                    s
                )
            })?;
        base.trim()
            .parse()
            .map(|base| Combinator::Polynomial { base })
            .map_err(|e| format!("Invalid polynomial base '{}': {}", base, e))
    }
}

/// A fingerprint function backed by a [`DistributionMap`].
///
/// The polynomial form is evaluated as `Σ contribution(v) · base^(k-1-pos(v))`
/// with precomputed per-variable weights, where `pos` is the position of the
/// variable among the `k` randomized ones. Non-randomized variables weigh 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHash {
    map: DistributionMap,
    combinator: Combinator,
    weights: Vec<u32>,
}

impl TableHash {
    pub fn new(map: DistributionMap, combinator: Combinator) -> Self {
        let weights = match combinator {
            Combinator::Xor => Vec::new(),
            Combinator::Polynomial { base } => {
                let randomized: Vec<usize> =
                    (0..map.num_vars()).filter(|&v| map.is_randomized(v)).collect();
                let mut weights = vec![0u32; map.num_vars()];
                let mut power = 1u32;
                for &var in randomized.iter().rev() {
                    weights[var] = power;
                    power = power.wrapping_mul(base);
                }
                weights
            }
        };
        Self {
            map,
            combinator,
            weights,
        }
    }

    pub fn map(&self) -> &DistributionMap {
        &self.map
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn hash(&self, state: &[Value]) -> Fingerprint {
        match self.combinator {
            Combinator::Xor => state
                .iter()
                .enumerate()
                .fold(0, |acc, (var, &value)| acc ^ self.map.contribution(var, value)),
            Combinator::Polynomial { .. } => {
                state.iter().enumerate().fold(0u32, |acc, (var, &value)| {
                    acc.wrapping_add(self.map.contribution(var, value).wrapping_mul(self.weights[var]))
                })
            }
        }
    }

    /// Update `parent_fingerprint` for the variables `op` actually changes.
    pub fn hash_incremental(
        &self,
        parent: &[Value],
        parent_fingerprint: Fingerprint,
        op: &Operator,
    ) -> Fingerprint {
        let mut fingerprint = parent_fingerprint;
        for (var, post) in op.changes(parent) {
            let old = self.map.contribution(var, parent[var]);
            let new = self.map.contribution(var, post);
            fingerprint = match self.combinator {
                Combinator::Xor => fingerprint ^ old ^ new,
                Combinator::Polynomial { .. } => fingerprint
                    .wrapping_add(new.wrapping_sub(old).wrapping_mul(self.weights[var])),
            };
        }
        fingerprint
    }
}
