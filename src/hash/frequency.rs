//! Frequency-dependent tables: the treatment of each variable depends on
//! how many operators change it.

use super::table::DistributionMap;
use crate::partition::{CutStrategy, Partitioner};
use crate::task::Task;
use rand::Rng;
use tracing::debug;

/// Build tables where a variable whose normalized frequency rank is
///
/// - above `ignore` contributes zero,
/// - at least `structure` (and has more than two values) gets one shared
///   contribution per group of `strategy`'s cut,
/// - otherwise gets a random contribution per value.
pub fn frequency_dependent<R: Rng + ?Sized>(
    task: &Task,
    ignore: f64,
    structure: f64,
    strategy: CutStrategy,
    rng: &mut R,
) -> DistributionMap {
    let domains = task.domain_sizes();
    let rank = task.normalized_frequency_rank();
    let partitioner = Partitioner::new(task, strategy);
    let mut map = DistributionMap::zeros(&domains);

    for var in 0..domains.len() {
        if rank[var] > ignore {
            debug!(var, rank = rank[var], "ignoring frequently changed variable");
        } else if rank[var] >= structure && domains[var] > 2 {
            for group in &partitioner.cut(var, rng).groups {
                map.share(var, group, rng);
            }
        } else {
            map.randomize_var(var, rng);
        }
    }
    map
}
