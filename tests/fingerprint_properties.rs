mod common;

use hdastar::hash::{
    owner_of, Combinator, DistributionHash, ExternalTable, Fingerprint, HashConfig, HashKind,
};
use hdastar::partition::{CutStrategy, Partitioner, Sparsity};
use hdastar::task::{EdgeWeight, Task, Value};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};

fn table_kinds() -> Vec<HashKind> {
    [
        "zobrist",
        "abstraction(0.5)",
        "abstraction(0.5,incidence)",
        "fstructured(0.5)",
        "feature_action(0.7)",
        "astructured(0.5)",
        "freq_depend(0.6,0)",
        "freq_depend(0.3,0.8)",
    ]
    .iter()
    .map(|spec| spec.parse().expect("valid hash spec"))
    .collect()
}

fn configs(seed: u64) -> Vec<HashConfig> {
    let mut configs = Vec::new();
    for kind in table_kinds() {
        for combinator in [Combinator::Xor, Combinator::Polynomial { base: 31 }] {
            configs.push(
                HashConfig::default()
                    .with_kind(kind.clone())
                    .with_combinator(combinator)
                    .with_seed(seed),
            );
        }
    }
    configs.push(
        HashConfig::default()
            .with_kind(
                HashKind::FrequencyDependent {
                    ignore: 0.5,
                    structure: 0.0,
                    cut: CutStrategy::Greedy,
                }
                .with_cut_strategy(CutStrategy::RandomUpdating {
                    update_factor: 5,
                    sparsity: Sparsity::CutOverSmallerGraphSize,
                    always_cut: true,
                    edge_weight: EdgeWeight::GroundAction,
                }),
            )
            .with_seed(seed),
    );
    configs
}

/// An external table covering roughly half the states of `task`.
fn external_table(task: &Task, rng: &mut ChaCha8Rng) -> DistributionHash {
    let mut entries: HashMap<Vec<Value>, Fingerprint> = HashMap::new();
    for _ in 0..64 {
        entries.insert(common::random_state(task, rng), rng.random());
    }
    DistributionHash::External(ExternalTable::from_entries(entries))
}

fn assert_incremental_matches(task: &Task, hash: &DistributionHash, rng: &mut ChaCha8Rng) {
    for _ in 0..16 {
        let state = common::random_state(task, rng);
        let fingerprint = hash.hash(&state);
        for op_id in task.applicable_operators(&state) {
            let op = &task.operators[op_id];
            let child = op.apply(&state);
            assert_eq!(
                hash.hash_incremental(&state, fingerprint, op),
                hash.hash(&child),
                "{} disagrees on {:?} -> {:?} via {}",
                hash.variant_name(),
                state,
                child,
                op.name
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_hash_matches_full_hash(task_seed in any::<u64>(), hash_seed in any::<u64>()) {
        let task = common::random_task(task_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(task_seed ^ hash_seed);
        for config in configs(hash_seed) {
            let hash = DistributionHash::build(&task, &config).expect("table hashes build");
            assert_incremental_matches(&task, &hash, &mut rng);
        }
        let external = external_table(&task, &mut rng);
        assert_incremental_matches(&task, &external, &mut rng);
    }

    #[test]
    fn hash_is_deterministic_across_instances(task_seed in any::<u64>(), hash_seed in any::<u64>()) {
        let task = common::random_task(task_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(task_seed);
        for config in configs(hash_seed) {
            let a = DistributionHash::build(&task, &config).expect("builds");
            let b = DistributionHash::build(&task, &config).expect("builds");
            prop_assert_eq!(&a, &b);
            for _ in 0..8 {
                let state = common::random_state(&task, &mut rng);
                prop_assert_eq!(a.hash(&state), b.hash(&state));
            }
        }
    }

    #[test]
    fn cuts_partition_the_domain(task_seed in any::<u64>(), cut_seed in any::<u64>(), greedy in any::<bool>()) {
        let task = common::random_task(task_seed);
        let strategy = if greedy {
            CutStrategy::Greedy
        } else {
            CutStrategy::random_updating()
        };
        let partitioner = Partitioner::new(&task, strategy);
        let mut rng = ChaCha8Rng::seed_from_u64(cut_seed);
        for (var, variable) in task.variables.iter().enumerate() {
            let cut = partitioner.cut(var, &mut rng);
            let covered: Vec<Value> = cut.covered().collect();
            let distinct: HashSet<Value> = covered.iter().copied().collect();
            prop_assert_eq!(covered.len(), distinct.len(), "groups overlap: {:?}", cut);
            prop_assert_eq!(distinct, (0..variable.domain as Value).collect::<HashSet<_>>());
            prop_assert!(cut.groups.iter().all(|g| !g.is_empty()));
        }
    }

    #[test]
    fn routing_is_total(fingerprint in any::<u32>(), world_size in 1usize..64) {
        let owner = owner_of(fingerprint, world_size);
        prop_assert!(owner < world_size);
        prop_assert_eq!(owner, fingerprint as usize % world_size);
    }
}

#[test]
fn worked_example_tables() {
    use hdastar::hash::{DistributionMap, TableHash};
    use hdastar::task::{Effect, Operator};

    let map = DistributionMap::from_tables(vec![vec![5, 9], vec![1, 2, 3]]);
    let hash = TableHash::new(map, Combinator::Xor);
    assert_eq!(hash.hash(&[1, 2]), 10);

    let op = Operator {
        name: "reset".to_string(),
        cost: 1,
        prevail: vec![],
        effects: vec![Effect {
            var: 0,
            pre: Some(1),
            post: 0,
            conditions: vec![],
        }],
    };
    assert_eq!(hash.hash_incremental(&[1, 2], 10, &op), 6);
    assert_eq!(hash.hash(&[0, 2]), 6);
}

#[test]
fn initial_state_has_exactly_one_owner() {
    let task = common::gripper();
    for kind in table_kinds() {
        let config = HashConfig::default().with_kind(kind);
        let hash = DistributionHash::build(&task, &config).unwrap();
        let fingerprint = hash.hash(&task.initial);
        for world_size in 1..8 {
            let owners: Vec<usize> = (0..world_size)
                .filter(|&rank| owner_of(fingerprint, world_size) == rank)
                .collect();
            assert_eq!(owners.len(), 1);
        }
    }
}
