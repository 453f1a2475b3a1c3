use clap::{Parser, Subcommand, ValueEnum};
use hdastar::hash::{
    evaluate_candidates, select, DistributionHash, HashConfig, HashKind, TrialBudget,
    DEFAULT_HASH_SEED,
};
use hdastar::heuristic::HeuristicKind;
use hdastar::partition::{CutStrategy, Partitioner};
use hdastar::search::{
    run_distributed, run_simulated, ParallelConfig, SearchConfig, SearchResult, SimConfig,
};
use hdastar::task::Task;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "hdastar")]
#[command(about = "hdastar - distributed best-first search with work-distribution hashes")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// CLI heuristic selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliHeuristic {
    /// Zero everywhere
    Blind,
    /// Number of unsatisfied goal facts
    GoalCount,
}

impl From<CliHeuristic> for HeuristicKind {
    fn from(cli: CliHeuristic) -> Self {
        match cli {
            CliHeuristic::Blind => HeuristicKind::Blind,
            CliHeuristic::GoalCount => HeuristicKind::GoalCount,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a task with distributed search
    Search {
        /// Path to the task JSON file
        #[arg(long)]
        task: PathBuf,
        /// Number of workers
        #[arg(long, short = 'j')]
        cores: Option<usize>,
        /// Distribution hash, e.g. zobrist, abstraction(0.3), freq_depend(0.6,0)
        #[arg(long, default_value = "zobrist")]
        hash: HashKind,
        /// Combine contributions polynomially with this base instead of XOR
        #[arg(long)]
        polynomial: Option<u32>,
        /// Cut strategy for freq_depend, e.g. two_groups_and_rest
        #[arg(long)]
        cut: Option<CutStrategy>,
        /// Heuristic each worker uses
        #[arg(long, value_enum, default_value = "blind")]
        heuristic: CliHeuristic,
        /// Records buffered per destination before a batch is sent
        #[arg(long, default_value = "0")]
        threshold: usize,
        /// Timeout in seconds for the search
        #[arg(long)]
        timeout: Option<u64>,
        /// Seed shared by all workers for hash construction
        #[arg(long, default_value_t = DEFAULT_HASH_SEED)]
        seed: u64,
        /// Run the workers in the deterministic simulator instead of threads
        #[arg(long)]
        simulate: bool,
    },
    /// Print the contribution tables and domain cuts of a hash
    Hash {
        /// Path to the task JSON file
        #[arg(long)]
        task: PathBuf,
        /// Distribution hash
        #[arg(long, default_value = "zobrist")]
        hash: HashKind,
        /// Combine contributions polynomially with this base
        #[arg(long)]
        polynomial: Option<u32>,
        /// Cut strategy for freq_depend and the printed cuts
        #[arg(long)]
        cut: Option<CutStrategy>,
        /// Seed for hash construction and cuts
        #[arg(long, default_value_t = DEFAULT_HASH_SEED)]
        seed: u64,
    },
    /// Trial several hashes and pick the most efficient one
    Select {
        /// Path to the task JSON file
        #[arg(long)]
        task: PathBuf,
        /// Candidate hashes, e.g. zobrist fstructured(0.3)+polynomial(31)
        #[arg(long, num_args = 1.., required = true)]
        candidates: Vec<HashConfig>,
        /// Simulated rounds per candidate
        #[arg(long, default_value = "2000")]
        budget: u64,
        /// Simulated workers per candidate
        #[arg(long, short = 'j', default_value = "4")]
        cores: usize,
        /// Penalty per unit of remote ratio
        #[arg(long, default_value = "0.5")]
        communication_weight: f64,
        /// Seed for hash construction and the simulated network
        #[arg(long, default_value_t = DEFAULT_HASH_SEED)]
        seed: u64,
    },
}

/// Options for the search command
struct SearchOptions {
    hash: HashConfig,
    search: SearchConfig,
    parallel: ParallelConfig,
    seed: u64,
    simulate: bool,
}

/// Override the cut of a frequency-dependent hash. Without `--cut` the
/// kind keeps the default strategy it was parsed with.
fn apply_cut(kind: HashKind, cut: Option<CutStrategy>) -> HashKind {
    match cut {
        Some(strategy) => kind.with_cut_strategy(strategy),
        None => kind,
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_task(path: &Path) -> Result<Arc<Task>, Box<dyn std::error::Error>> {
    let task = Task::from_file(path)?;
    println!(
        "Task: {} ({} variables, {} operators)",
        path.display(),
        task.num_vars(),
        task.operators.len()
    );
    Ok(Arc::new(task))
}

// --- Commands ---

fn run_search(path: &Path, options: &SearchOptions) -> Result<(), Box<dyn std::error::Error>> {
    let task = load_task(path)?;
    let hash = Arc::new(DistributionHash::build(&task, &options.hash)?);
    println!("Hash: {}", options.hash);
    println!("Workers: {}", options.parallel.num_workers);

    let result: SearchResult = if options.simulate {
        let sim = SimConfig::default().with_seed(options.seed);
        run_simulated(
            Arc::clone(&task),
            hash,
            &options.search,
            options.parallel.num_workers,
            sim,
        )?
    } else {
        run_distributed(Arc::clone(&task), hash, &options.search, &options.parallel)?
    };

    println!();
    print!("{}", result.format_summary());
    if let Some(plan) = &result.plan {
        println!("\nPlan:");
        for &op in &plan.operators {
            println!("  {} ({})", task.operators[op].name, task.operators[op].cost);
        }
    }
    Ok(())
}

fn print_hash(
    path: &Path,
    config: &HashConfig,
    cut: CutStrategy,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = load_task(path)?;
    let hash = DistributionHash::build(&task, config)?;
    println!("Hash: {} ({})", config, hash.variant_name());

    match hash.table() {
        Some(table) => {
            println!("\nContribution tables:");
            for (var, variable) in task.variables.iter().enumerate() {
                let marker = if table.map().is_randomized(var) { "*" } else { " " };
                println!("{} {:<20} {:?}", marker, variable.name, table.map().table(var));
            }
        }
        None => {
            if let DistributionHash::External(external) = &hash {
                println!("External table: {} entries", external.len());
            }
        }
    }

    println!("\nCuts ({}):", cut);
    let partitioner = Partitioner::new(&task, cut);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    for (var, variable) in task.variables.iter().enumerate() {
        let result = partitioner.cut(var, &mut rng);
        println!(
            "  {:<20} groups {:?} dropped {:?}",
            variable.name, result.groups, result.dropped
        );
    }
    Ok(())
}

fn run_selection(
    path: &Path,
    candidates: Vec<HashConfig>,
    budget: &TrialBudget,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = load_task(path)?;
    let candidates: Vec<HashConfig> = candidates
        .into_iter()
        .map(|c| c.with_seed(budget.seed))
        .collect();
    let report = evaluate_candidates(&task, &candidates, budget, &SearchConfig::default())?;
    println!();
    print!("{}", report.format_summary());
    let winner = report
        .best_trial()
        .map(|t| t.config.to_string())
        .unwrap_or_default();
    let hash = select(report)?;
    println!("\nSelected: {} ({})", winner, hash.variant_name());
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let outcome = match args.command {
        Commands::Search {
            task,
            cores,
            hash,
            polynomial,
            cut,
            heuristic,
            threshold,
            timeout,
            seed,
            simulate,
        } => {
            let kind = apply_cut(hash, cut);
            let mut parallel =
                ParallelConfig::default().with_timeout_option(timeout.map(Duration::from_secs));
            if let Some(n) = cores {
                parallel = parallel.with_workers(n);
            }
            let options = SearchOptions {
                hash: HashConfig::default()
                    .with_kind(kind)
                    .with_polynomial(polynomial)
                    .with_seed(seed),
                search: SearchConfig::default()
                    .with_flush_threshold(threshold)
                    .with_heuristic(heuristic.into()),
                parallel,
                seed,
                simulate,
            };
            run_search(&task, &options)
        }
        Commands::Hash {
            task,
            hash,
            polynomial,
            cut,
            seed,
        } => {
            let kind = apply_cut(hash, cut);
            let cut = kind.cut_strategy().or(cut).unwrap_or_default();
            let config = HashConfig::default()
                .with_kind(kind)
                .with_polynomial(polynomial)
                .with_seed(seed);
            print_hash(&task, &config, cut)
        }
        Commands::Select {
            task,
            candidates,
            budget,
            cores,
            communication_weight,
            seed,
        } => {
            let budget = TrialBudget::default()
                .with_rounds(budget)
                .with_workers(cores)
                .with_communication_weight(communication_weight)
                .with_seed(seed);
            run_selection(&task, candidates, &budget)
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
