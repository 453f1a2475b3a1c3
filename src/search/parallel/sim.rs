//! Deterministic single-threaded runtime.
//!
//! Every worker shares one in-memory [`SimNetwork`]. Each message is held
//! back for a seeded random number of rounds and, once deliverable, competes
//! with the other ready messages for the same receiver in random order.
//! Termination tokens on one edge keep their send order. Workers are
//! stepped once per round in a freshly shuffled order, so a run is fully
//! reproducible from [`SimConfig::seed`].

use crate::error::SearchError;
use crate::hash::DistributionHash;
use crate::search::config::SearchConfig;
use crate::search::message::{Envelope, Message, Transport};
use crate::search::result::SearchResult;
use crate::search::worker::HdaWorker;
use crate::task::Task;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Upper bound, in rounds, of the random delivery delay.
    pub max_delay: u64,
    /// Rounds after which [`Simulation::run`] gives up.
    pub max_rounds: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            max_delay: 2,
            max_rounds: 1_000_000,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_delay(mut self, rounds: u64) -> Self {
        self.max_delay = rounds;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u64) -> Self {
        self.max_rounds = rounds;
        self
    }
}

#[derive(Debug)]
struct InFlight {
    deliver_at: u64,
    seq: u64,
    from: usize,
    to: usize,
    message: Message,
}

impl InFlight {
    fn is_token(&self) -> bool {
        matches!(self.message, Message::TerminationToken(_))
    }
}

/// Shared message pool of a simulated world.
#[derive(Debug)]
pub struct SimNetwork {
    rng: ChaCha8Rng,
    max_delay: u64,
    round: u64,
    next_seq: u64,
    in_flight: Vec<InFlight>,
    delivered: u64,
}

impl SimNetwork {
    pub fn new(seed: u64, max_delay: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_delay,
            round: 0,
            next_seq: 0,
            in_flight: Vec::new(),
            delivered: 0,
        }
    }

    pub fn schedule(&mut self, from: usize, to: usize, message: Message) {
        let delay = self.rng.random_range(0..=self.max_delay);
        trace!(from, to, kind = message.kind(), delay, "message scheduled");
        self.in_flight.push(InFlight {
            deliver_at: self.round + delay,
            seq: self.next_seq,
            from,
            to,
            message,
        });
        self.next_seq += 1;
    }

    /// A random ready message for `to`. A token is only eligible when no
    /// older token on the same edge is still in flight.
    pub fn deliver(&mut self, to: usize) -> Option<Envelope> {
        let ready: Vec<usize> = (0..self.in_flight.len())
            .filter(|&i| {
                let m = &self.in_flight[i];
                m.to == to && m.deliver_at <= self.round && !self.overtakes_token(m)
            })
            .collect();
        let &index = ready.choose(&mut self.rng)?;
        let m = self.in_flight.swap_remove(index);
        self.delivered += 1;
        Some(Envelope {
            from: m.from,
            message: m.message,
        })
    }

    fn overtakes_token(&self, m: &InFlight) -> bool {
        m.is_token()
            && self
                .in_flight
                .iter()
                .any(|o| o.is_token() && o.from == m.from && o.to == m.to && o.seq < m.seq)
    }

    pub fn advance(&mut self) {
        self.round += 1;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

/// A worker's handle on the shared [`SimNetwork`].
pub struct SimTransport {
    rank: usize,
    world_size: usize,
    network: Rc<RefCell<SimNetwork>>,
}

impl Transport for SimTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, to: usize, message: Message) {
        self.network.borrow_mut().schedule(self.rank, to, message);
    }

    fn try_recv(&mut self) -> Option<Envelope> {
        self.network.borrow_mut().deliver(self.rank)
    }
}

pub struct Simulation {
    workers: Vec<HdaWorker<SimTransport>>,
    network: Rc<RefCell<SimNetwork>>,
    order_rng: ChaCha8Rng,
    config: SimConfig,
    rounds: u64,
}

impl Simulation {
    pub fn new(
        task: Arc<Task>,
        hash: Arc<DistributionHash>,
        search_config: &SearchConfig,
        world_size: usize,
        config: SimConfig,
    ) -> Result<Self, SearchError> {
        if world_size == 0 {
            return Err(SearchError::EmptyWorld);
        }
        let network = Rc::new(RefCell::new(SimNetwork::new(config.seed, config.max_delay)));
        let workers = (0..world_size)
            .map(|rank| {
                let transport = SimTransport {
                    rank,
                    world_size,
                    network: Rc::clone(&network),
                };
                HdaWorker::new(
                    Arc::clone(&task),
                    Arc::clone(&hash),
                    search_config.heuristic.build(),
                    transport,
                    search_config.clone(),
                )
            })
            .collect();
        Ok(Self {
            workers,
            network,
            order_rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
            config,
            rounds: 0,
        })
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn workers(&self) -> &[HdaWorker<SimTransport>] {
        &self.workers
    }

    pub fn is_done(&self) -> bool {
        self.workers.iter().all(|w| w.is_done())
    }

    /// Step every worker once in random order, then advance the clock.
    pub fn round(&mut self) {
        let mut order: Vec<usize> = (0..self.workers.len()).collect();
        order.shuffle(&mut self.order_rng);
        for rank in order {
            self.workers[rank].step();
        }
        self.network.borrow_mut().advance();
        self.rounds += 1;
    }

    /// Run until every worker is done or `rounds` more rounds have passed.
    /// Returns whether the run completed.
    pub fn run_for(&mut self, rounds: u64) -> bool {
        for worker in &mut self.workers {
            worker.initialize();
        }
        for _ in 0..rounds {
            if self.is_done() {
                break;
            }
            self.round();
        }
        let done = self.is_done();
        debug!(
            rounds = self.rounds,
            done,
            delivered = self.network.borrow().delivered(),
            in_flight = self.network.borrow().in_flight(),
            "simulation paused"
        );
        done
    }

    /// Collect the workers' outcomes. An unfinished run is reported as
    /// aborted.
    pub fn finish(self) -> SearchResult {
        let aborted = !self.is_done();
        let outcomes = self
            .workers
            .into_iter()
            .map(HdaWorker::into_outcome)
            .collect();
        SearchResult::from_outcomes(outcomes, aborted)
    }

    /// Run to completion within [`SimConfig::max_rounds`].
    pub fn run(mut self) -> Result<SearchResult, SearchError> {
        let max_rounds = self.config.max_rounds;
        if !self.run_for(max_rounds) {
            return Err(SearchError::RoundLimit(max_rounds));
        }
        info!(rounds = self.rounds, "simulation finished");
        Ok(self.finish())
    }
}

/// Build a simulated world of `world_size` workers and run it to completion.
pub fn run_simulated(
    task: Arc<Task>,
    hash: Arc<DistributionHash>,
    search_config: &SearchConfig,
    world_size: usize,
    config: SimConfig,
) -> Result<SearchResult, SearchError> {
    Simulation::new(task, hash, search_config, world_size, config)?.run()
}
