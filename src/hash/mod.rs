//! Work-distribution hashes.
//!
//! A [`DistributionHash`] maps a state to a 32-bit fingerprint; the worker
//! owning the state is `fingerprint mod world_size` (see [`owner_of`]).
//! Every worker builds the same hash from the same task and seed, so any
//! worker computes the same owner for the same state.
//!
//! All variants support an incremental update from a parent fingerprint
//! and a single operator application, which equals hashing the child state
//! from scratch.
//!
//! # Example
//!
//! ```ignore
//! use hdastar::hash::{DistributionHash, HashConfig, HashKind};
//!
//! let config = HashConfig::default().with_kind(HashKind::Abstraction {
//!     ratio: 0.3,
//!     selection: Default::default(),
//! });
//! let hash = DistributionHash::build(&task, &config)?;
//! let owner = hdastar::hash::owner_of(hash.hash(&task.initial), 4);
//! ```

pub mod external;
pub mod frequency;
pub mod selection;
pub mod structured;
pub mod table;

use crate::error::HashError;
use crate::partition::CutStrategy;
use crate::task::{Operator, Task, Value};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing::info;

pub use external::ExternalTable;
pub use selection::{evaluate_candidates, select, CandidateTrial, SelectionReport, TrialBudget};
pub use structured::AbstractionSelection;
pub use table::{Combinator, DistributionMap, TableHash};

pub type Fingerprint = u32;

/// Seed shared by all workers when none is configured.
pub const DEFAULT_HASH_SEED: u64 = 717;

/// Worker owning a fingerprint.
pub fn owner_of(fingerprint: Fingerprint, world_size: usize) -> usize {
    fingerprint as usize % world_size
}

/// Which contribution tables to build.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HashKind {
    #[default]
    Zobrist,
    Abstraction {
        ratio: f64,
        selection: AbstractionSelection,
    },
    FeatureStructured {
        ratio: f64,
    },
    FeatureAction {
        ratio: f64,
    },
    ActionStructured {
        ratio: f64,
        max_failures: usize,
    },
    FrequencyDependent {
        ignore: f64,
        structure: f64,
        cut: CutStrategy,
    },
    External {
        path: PathBuf,
    },
}

impl HashKind {
    /// Cut strategy the kind partitions domains with, if it uses one.
    pub fn cut_strategy(&self) -> Option<CutStrategy> {
        match self {
            HashKind::FrequencyDependent { cut, .. } => Some(*cut),
            _ => None,
        }
    }

    /// Replace the cut strategy of a frequency-dependent kind.
    pub fn with_cut_strategy(self, strategy: CutStrategy) -> Self {
        match self {
            HashKind::FrequencyDependent {
                ignore, structure, ..
            } => HashKind::FrequencyDependent {
                ignore,
                structure,
                cut: strategy,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashKind::Zobrist => write!(f, "zobrist"),
            HashKind::Abstraction { ratio, selection } => match selection {
                AbstractionSelection::DomainBudget => write!(f, "abstraction({})", ratio),
                other => write!(f, "abstraction({},{})", ratio, other),
            },
            HashKind::FeatureStructured { ratio } => write!(f, "fstructured({})", ratio),
            HashKind::FeatureAction { ratio } => write!(f, "feature_action({})", ratio),
            HashKind::ActionStructured {
                ratio,
                max_failures,
            } => {
                if *max_failures == DEFAULT_MAX_FAILURES {
                    write!(f, "astructured({})", ratio)
                } else {
                    write!(f, "astructured({},{})", ratio, max_failures)
                }
            }
            HashKind::FrequencyDependent {
                ignore, structure, ..
            } => write!(f, "freq_depend({},{})", ignore, structure),
            HashKind::External { path } => write!(f, "external({})", path.display()),
        }
    }
}

const DEFAULT_MAX_FAILURES: usize = 20;

fn split_call(s: &str) -> Result<(String, Vec<String>), String> {
    let s = s.trim();
    match s.find('(') {
        None => Ok((s.to_lowercase(), Vec::new())),
        Some(open) => {
            let inner = s[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| format!("Missing ')' in '{}'", s))?;
            let args = inner
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            Ok((s[..open].trim().to_lowercase(), args))
        }
    }
}

fn float_arg(args: &[String], index: usize, default: f64, name: &str) -> Result<f64, String> {
    match args.get(index) {
        None => Ok(default),
        Some(a) => a
            .parse::<f64>()
            .map_err(|e| format!("Invalid {} '{}': {}", name, a, e)),
    }
}

impl std::str::FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = split_call(s)?;
        match name.replace('-', "_").as_str() {
            "zobrist" | "plain" => Ok(HashKind::Zobrist),
            "abstraction" => Ok(HashKind::Abstraction {
                ratio: float_arg(&args, 0, 0.3, "abstraction ratio")?,
                selection: match args.get(1) {
                    Some(sel) => sel.parse()?,
                    None => AbstractionSelection::default(),
                },
            }),
            "fstructured" => Ok(HashKind::FeatureStructured {
                ratio: float_arg(&args, 0, 0.3, "abstraction ratio")?,
            }),
            "feature_action" => Ok(HashKind::FeatureAction {
                ratio: float_arg(&args, 0, 0.7, "abstraction ratio")?,
            }),
            "astructured" => Ok(HashKind::ActionStructured {
                ratio: float_arg(&args, 0, 0.3, "abstraction ratio")?,
                max_failures: match args.get(1) {
                    Some(a) => a
                        .parse()
                        .map_err(|e| format!("Invalid max failures '{}': {}", a, e))?,
                    None => DEFAULT_MAX_FAILURES,
                },
            }),
            "freq_depend" => Ok(HashKind::FrequencyDependent {
                ignore: float_arg(&args, 0, 0.6, "ignore threshold")?,
                structure: float_arg(&args, 1, 0.0, "structure threshold")?,
                cut: CutStrategy::default(),
            }),
            "external" | "metis" => match args.as_slice() {
                [path] => Ok(HashKind::External {
                    path: PathBuf::from(path),
                }),
                _ => Err(format!("'{}' needs exactly one file path", s)),
            },
            _ => Err(format!(
                "Unknown hash: '{}'. Valid options: zobrist, abstraction, fstructured, \
                 feature_action, astructured, freq_depend, external",
                s
            )),
        }
    }
}

/// Full description of a distribution hash.
#[derive(Debug, Clone, PartialEq)]
pub struct HashConfig {
    pub kind: HashKind,
    pub combinator: Combinator,
    /// Seed shared by all workers.
    pub seed: u64,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            kind: HashKind::default(),
            combinator: Combinator::default(),
            seed: DEFAULT_HASH_SEED,
        }
    }
}

impl HashConfig {
    pub fn with_kind(mut self, kind: HashKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    pub fn with_polynomial(self, base: Option<u32>) -> Self {
        match base {
            Some(base) => self.with_combinator(Combinator::Polynomial { base }),
            None => self.with_combinator(Combinator::Xor),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl std::fmt::Display for HashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, self.combinator) {
            (HashKind::External { .. }, _) | (_, Combinator::Xor) => write!(f, "{}", self.kind),
            (kind, combinator) => write!(f, "{}+{}", kind, combinator),
        }
    }
}

impl std::str::FromStr for HashConfig {
    type Err = String;

    /// `KIND[+COMBINATOR]`, e.g. `fstructured(0.3)+polynomial(31)`. The seed
    /// is the default one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((kind, combinator)) = s.rsplit_once('+') {
            if let Ok(combinator) = combinator.parse::<Combinator>() {
                return Ok(HashConfig::default()
                    .with_kind(kind.parse()?)
                    .with_combinator(combinator));
            }
        }
        Ok(HashConfig::default().with_kind(s.parse()?))
    }
}

/// A constructed work-distribution hash. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionHash {
    Zobrist(TableHash),
    Abstraction(TableHash),
    FeatureStructured(TableHash),
    FeatureAction(TableHash),
    ActionStructured(TableHash),
    FrequencyDependent(TableHash),
    External(ExternalTable),
}

impl DistributionHash {
    pub fn build(task: &Task, config: &HashConfig) -> Result<Self, HashError> {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let domains = task.domain_sizes();
        let table = |map| TableHash::new(map, config.combinator);
        let hash = match &config.kind {
            HashKind::Zobrist => {
                DistributionHash::Zobrist(table(DistributionMap::random(&domains, &mut rng)))
            }
            HashKind::Abstraction { ratio, selection } => DistributionHash::Abstraction(table(
                structured::abstraction(task, *ratio, *selection, &mut rng),
            )),
            HashKind::FeatureStructured { ratio } => DistributionHash::FeatureStructured(table(
                structured::feature_structured(task, *ratio, &mut rng),
            )),
            HashKind::FeatureAction { ratio } => DistributionHash::FeatureAction(table(
                structured::feature_action(task, *ratio, &mut rng),
            )),
            HashKind::ActionStructured {
                ratio,
                max_failures,
            } => DistributionHash::ActionStructured(table(structured::action_structured(
                task,
                *ratio,
                *max_failures,
                &mut rng,
            ))),
            HashKind::FrequencyDependent {
                ignore,
                structure,
                cut,
            } => DistributionHash::FrequencyDependent(table(frequency::frequency_dependent(
                task, *ignore, *structure, *cut, &mut rng,
            ))),
            HashKind::External { path } => {
                DistributionHash::External(ExternalTable::load(path, task.num_vars())?)
            }
        };
        info!(hash = %config, "built distribution hash");
        Ok(hash)
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            DistributionHash::Zobrist(_) => "zobrist",
            DistributionHash::Abstraction(_) => "abstraction",
            DistributionHash::FeatureStructured(_) => "fstructured",
            DistributionHash::FeatureAction(_) => "feature_action",
            DistributionHash::ActionStructured(_) => "astructured",
            DistributionHash::FrequencyDependent(_) => "freq_depend",
            DistributionHash::External(_) => "external",
        }
    }

    /// Contribution tables, for table-backed variants.
    pub fn table(&self) -> Option<&TableHash> {
        match self {
            DistributionHash::Zobrist(t)
            | DistributionHash::Abstraction(t)
            | DistributionHash::FeatureStructured(t)
            | DistributionHash::FeatureAction(t)
            | DistributionHash::ActionStructured(t)
            | DistributionHash::FrequencyDependent(t) => Some(t),
            DistributionHash::External(_) => None,
        }
    }

    pub fn hash(&self, state: &[Value]) -> Fingerprint {
        match self {
            DistributionHash::External(t) => t.hash(state),
            _ => self.table().map_or(0, |t| t.hash(state)),
        }
    }

    /// Fingerprint of `op` applied to `parent`, given the parent's
    /// fingerprint.
    pub fn hash_incremental(
        &self,
        parent: &[Value],
        parent_fingerprint: Fingerprint,
        op: &Operator,
    ) -> Fingerprint {
        match self {
            DistributionHash::External(t) => t.hash_incremental(parent, op),
            _ => self
                .table()
                .map_or(0, |t| t.hash_incremental(parent, parent_fingerprint, op)),
        }
    }
}
