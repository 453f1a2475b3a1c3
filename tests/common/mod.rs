//! Task fixtures shared by the integration tests.

#![allow(dead_code)]

use hdastar::task::{Effect, Fact, Operator, Task, Value, Variable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

pub fn demo_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// The two-ball gripper task shipped in `demos/`. Optimal cost 7.
pub fn gripper() -> Task {
    Task::from_file(&demo_path("gripper.json")).expect("demo task loads")
}

fn variables(domains: &[usize]) -> Vec<Variable> {
    domains
        .iter()
        .enumerate()
        .map(|(i, &domain)| Variable {
            name: format!("v{}", i),
            domain,
        })
        .collect()
}

fn assign(name: String, var: usize, pre: Option<Value>, post: Value) -> Operator {
    Operator {
        name,
        cost: 1,
        prevail: vec![],
        effects: vec![Effect {
            var,
            pre,
            post,
            conditions: vec![],
        }],
    }
}

/// A `side × side` grid walked one step at a time in every direction.
/// The goal asks for a third variable that no operator changes, so the
/// task is unsolvable and the whole grid must be exhausted.
pub fn unsolvable_grid(side: usize) -> Task {
    let mut operators = Vec::new();
    for var in 0..2 {
        for v in 0..side as Value - 1 {
            operators.push(assign(format!("inc-{}-{}", var, v), var, Some(v), v + 1));
            operators.push(assign(format!("dec-{}-{}", var, v + 1), var, Some(v + 1), v));
        }
    }
    Task {
        variables: variables(&[side, side, 2]),
        operators,
        initial: vec![0, 0, 0],
        goal: vec![Fact::new(2, 1)],
    }
}

/// Three boolean variables and four operators:
/// `set-a`, `set-b` (needs a), `set-c` (needs b) and an expensive
/// `shortcut` that sets c directly. The goal `c = 1` costs 3 via the chain.
pub fn three_bits() -> Task {
    let mut set_b = assign("set-b".to_string(), 1, Some(0), 1);
    set_b.prevail.push(Fact::new(0, 1));
    let mut set_c = assign("set-c".to_string(), 2, Some(0), 1);
    set_c.prevail.push(Fact::new(1, 1));
    let mut shortcut = assign("shortcut".to_string(), 2, Some(0), 1);
    shortcut.cost = 5;
    Task {
        variables: variables(&[2, 2, 2]),
        operators: vec![
            assign("set-a".to_string(), 0, Some(0), 1),
            set_b,
            set_c,
            shortcut,
        ],
        initial: vec![0, 0, 0],
        goal: vec![Fact::new(2, 1)],
    }
}

/// A random task: 1-5 variables with domains of 2-5 values and up to
/// eight operators with prevail conditions, optional preconditions and
/// conditional effects.
pub fn random_task(seed: u64) -> Task {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let num_vars = rng.random_range(1..=5);
    let domains: Vec<usize> = (0..num_vars).map(|_| rng.random_range(2..=5)).collect();
    let value = |rng: &mut ChaCha8Rng, var: usize| rng.random_range(0..domains[var]) as Value;

    let num_ops = rng.random_range(1..=8);
    let mut operators = Vec::with_capacity(num_ops);
    for i in 0..num_ops {
        let mut prevail = Vec::new();
        if rng.random_bool(0.3) {
            let var = rng.random_range(0..num_vars);
            prevail.push(Fact::new(var, value(&mut rng, var)));
        }
        let mut effects = Vec::new();
        for _ in 0..rng.random_range(1..=3) {
            let var = rng.random_range(0..num_vars);
            let pre = if rng.random_bool(0.5) {
                Some(value(&mut rng, var))
            } else {
                None
            };
            let conditions = if rng.random_bool(0.2) {
                let cvar = rng.random_range(0..num_vars);
                vec![Fact::new(cvar, value(&mut rng, cvar))]
            } else {
                vec![]
            };
            effects.push(Effect {
                var,
                pre,
                post: value(&mut rng, var),
                conditions,
            });
        }
        operators.push(Operator {
            name: format!("op-{}", i),
            cost: rng.random_range(0..=3),
            prevail,
            effects,
        });
    }

    let initial = (0..num_vars).map(|var| value(&mut rng, var)).collect();
    let goal_var = rng.random_range(0..num_vars);
    let goal = vec![Fact::new(goal_var, value(&mut rng, goal_var))];
    Task {
        variables: variables(&domains),
        operators,
        initial,
        goal,
    }
}

/// A random state of `task`.
pub fn random_state(task: &Task, rng: &mut ChaCha8Rng) -> Vec<Value> {
    task.variables
        .iter()
        .map(|v| rng.random_range(0..v.domain) as Value)
        .collect()
}
