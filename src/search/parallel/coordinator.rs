//! Threaded runtime: one OS thread per worker, connected by channels.

use crate::error::SearchError;
use crate::hash::DistributionHash;
use crate::search::config::SearchConfig;
use crate::search::parallel::channel::{create_transports, ChannelTransport, StopFlag};
use crate::search::parallel::config::ParallelConfig;
use crate::search::result::{SearchResult, WorkerOutcome};
use crate::search::worker::HdaWorker;
use crate::task::Task;
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Run a distributed search with `parallel_config.num_workers` threads.
pub fn run_distributed(
    task: Arc<Task>,
    hash: Arc<DistributionHash>,
    search_config: &SearchConfig,
    parallel_config: &ParallelConfig,
) -> Result<SearchResult, SearchError> {
    let num_workers = parallel_config.num_workers;
    if num_workers == 0 {
        return Err(SearchError::EmptyWorld);
    }
    let start_time = Instant::now();
    info!(
        workers = num_workers,
        hash = hash.variant_name(),
        "starting distributed search"
    );

    let stop = Arc::new(StopFlag::default());
    let barrier = Arc::new(Barrier::new(num_workers));

    let mut handles: Vec<Option<JoinHandle<WorkerOutcome>>> = create_transports(num_workers)
        .into_iter()
        .map(|transport| {
            let task = Arc::clone(&task);
            let hash = Arc::clone(&hash);
            let config = search_config.clone();
            let stop = Arc::clone(&stop);
            let barrier = Arc::clone(&barrier);
            let idle_wait = parallel_config.idle_wait;

            Some(std::thread::spawn(move || {
                let heuristic = config.heuristic.build();
                let worker = HdaWorker::new(task, hash, heuristic, transport, config);
                run_worker(worker, &stop, &barrier, idle_wait)
            }))
        })
        .collect();

    let deadline = parallel_config.timeout.map(|t| start_time + t);
    let mut outcomes = Vec::with_capacity(num_workers);
    let mut panicked = None;

    while outcomes.len() + usize::from(panicked.is_some()) < num_workers {
        if deadline.is_some_and(|d| Instant::now() >= d) && !stop.should_stop() {
            warn!("timeout reached, stopping workers");
            stop.signal_stop();
        }

        let mut joined_any = false;
        for (rank, slot) in handles.iter_mut().enumerate() {
            if !slot.as_ref().is_some_and(|h| h.is_finished()) {
                continue;
            }
            let Some(handle) = slot.take() else {
                continue;
            };
            joined_any = true;
            match handle.join() {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => {
                    warn!(rank, "worker panicked, stopping the search");
                    stop.signal_stop();
                    panicked.get_or_insert(rank);
                }
            }
        }
        if panicked.is_some() && handles.iter().all(Option::is_none) {
            break;
        }
        if !joined_any {
            std::thread::sleep(parallel_config.poll_interval);
        }
    }

    if let Some(rank) = panicked {
        return Err(SearchError::WorkerPanicked(rank));
    }

    let aborted = stop.should_stop();
    let result = SearchResult::from_outcomes(outcomes, aborted);
    info!(
        solved = result.solved(),
        aborted,
        elapsed = ?start_time.elapsed(),
        "distributed search finished"
    );
    Ok(result)
}

/// Worker thread body: seed, wait for every peer, then step until done or
/// stopped. An idle worker blocks on its inbox for up to `idle_wait`.
fn run_worker(
    mut worker: HdaWorker<ChannelTransport>,
    stop: &StopFlag,
    barrier: &Barrier,
    idle_wait: Duration,
) -> WorkerOutcome {
    worker.initialize();
    barrier.wait();

    while !worker.is_done() {
        if stop.should_stop() {
            break;
        }
        if !worker.step() {
            worker.wait_for_message(idle_wait);
        }
    }
    worker.into_outcome()
}
