//! Ring-based distributed termination detection.
//!
//! Each worker counts the work messages (node batches and incumbent
//! updates) it sends and receives. Worker 0 circulates a [`Token`] around
//! the ring `0 -> 1 -> ... -> n-1 -> 0`; a worker forwards the token only
//! while idle, adding its deficit and marking the token dirty if it received
//! work since the last visit. A lap that returns clean with a zero total
//! deficit while worker 0 is idle and clean proves that no work is in flight
//! and every worker is idle.

use crate::search::message::Token;

/// What the worker must do after an idle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationAction {
    Wait,
    /// Send the token to the next worker in the ring.
    Forward(Token),
    /// Global termination detected; broadcast it.
    Declare,
}

#[derive(Debug, Clone)]
pub struct TerminationDetector {
    rank: usize,
    world_size: usize,
    debounce: u32,
    deficit: i64,
    dirty: bool,
    held: Option<Token>,
    idle_steps: u32,
    lap_in_flight: bool,
    laps: u64,
}

impl TerminationDetector {
    pub fn new(rank: usize, world_size: usize, debounce: u32) -> Self {
        Self {
            rank,
            world_size,
            debounce,
            deficit: 0,
            dirty: false,
            held: None,
            idle_steps: 0,
            lap_in_flight: false,
            laps: 0,
        }
    }

    pub fn next_rank(&self) -> usize {
        (self.rank + 1) % self.world_size
    }

    pub fn on_work_sent(&mut self) {
        self.deficit += 1;
    }

    pub fn on_work_received(&mut self) {
        self.deficit -= 1;
        self.dirty = true;
    }

    /// A token arrived; it is held until the worker is idle.
    pub fn on_token(&mut self, token: Token) {
        self.held = Some(token);
    }

    /// The worker did useful work this step.
    pub fn on_busy(&mut self) {
        self.idle_steps = 0;
    }

    /// The worker is idle: frontier empty and every buffer flushed.
    pub fn on_idle(&mut self) -> TerminationAction {
        self.idle_steps = self.idle_steps.saturating_add(1);
        if self.world_size == 1 {
            return TerminationAction::Declare;
        }

        if self.rank != 0 {
            return match self.held.take() {
                Some(mut token) => {
                    token.count += self.deficit;
                    token.clean &= !self.dirty;
                    self.dirty = false;
                    TerminationAction::Forward(token)
                }
                None => TerminationAction::Wait,
            };
        }

        if let Some(token) = self.held.take() {
            self.lap_in_flight = false;
            if token.clean && !self.dirty && token.count + self.deficit == 0 {
                return TerminationAction::Declare;
            }
            self.idle_steps = 0;
        }
        if !self.lap_in_flight && self.idle_steps >= self.debounce {
            self.dirty = false;
            self.lap_in_flight = true;
            self.idle_steps = 0;
            self.laps += 1;
            return TerminationAction::Forward(Token::fresh());
        }
        TerminationAction::Wait
    }

    pub fn deficit(&self) -> i64 {
        self.deficit
    }

    pub fn is_holding_token(&self) -> bool {
        self.held.is_some()
    }

    /// Laps started by this worker.
    pub fn laps(&self) -> u64 {
        self.laps
    }
}
