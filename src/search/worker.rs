//! One HDA* worker: owns the states whose fingerprint maps to its rank,
//! expands them best-first and routes successors to their owners.

use crate::hash::{owner_of, DistributionHash, Fingerprint};
use crate::heuristic::{Evaluation, Heuristic};
use crate::search::config::SearchConfig;
use crate::search::frontier::Frontier;
use crate::search::incumbent::Incumbent;
use crate::search::message::{Envelope, Message, Transport};
use crate::search::node::{NodeStatus, ParentRef, SearchNode, SearchSpace};
use crate::search::result::{Plan, WorkerOutcome, WorkerStatistics};
use crate::search::termination::{TerminationAction, TerminationDetector};
use crate::search::wire::{decode_batch, record_size, NodeRecord};
use crate::task::{OperatorId, StateId, StateRegistry, Task, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Initializing,
    Running,
    /// Frontier empty, outgoing buffers were just flushed.
    Draining,
    /// Idle and taking part in termination detection.
    Terminating,
    Reconstructing,
    Done,
}

#[derive(Debug, Default)]
struct OutgoingBuffer {
    bytes: Vec<u8>,
    records: usize,
}

pub struct HdaWorker<T: Transport> {
    rank: usize,
    world_size: usize,
    task: Arc<Task>,
    hash: Arc<DistributionHash>,
    heuristic: Box<dyn Heuristic>,
    transport: T,
    config: SearchConfig,
    registry: StateRegistry,
    space: SearchSpace,
    frontier: Frontier,
    outgoing: Vec<OutgoingBuffer>,
    buffered_bytes: usize,
    record_size: usize,
    incumbent: Incumbent,
    goal_state: Option<StateId>,
    termination: TerminationDetector,
    phase: WorkerPhase,
    plan: Option<Plan>,
    stats: WorkerStatistics,
    started: Instant,
}

impl<T: Transport> HdaWorker<T> {
    pub fn new(
        task: Arc<Task>,
        hash: Arc<DistributionHash>,
        heuristic: Box<dyn Heuristic>,
        transport: T,
        config: SearchConfig,
    ) -> Self {
        let rank = transport.rank();
        let world_size = transport.world_size().max(1);
        let record_size = record_size(task.num_vars());
        Self {
            rank,
            world_size,
            heuristic,
            transport,
            registry: StateRegistry::new(),
            space: SearchSpace::new(),
            frontier: Frontier::new(),
            outgoing: (0..world_size).map(|_| OutgoingBuffer::default()).collect(),
            buffered_bytes: 0,
            record_size,
            incumbent: Incumbent::default(),
            goal_state: None,
            termination: TerminationDetector::new(rank, world_size, config.termination_debounce),
            phase: WorkerPhase::Initializing,
            plan: None,
            stats: WorkerStatistics::new(rank),
            started: Instant::now(),
            task,
            hash,
            config,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == WorkerPhase::Done
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn incumbent(&self) -> Incumbent {
        self.incumbent
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Search node registered for `state`, if this worker has seen it.
    pub fn node_for(&self, state: &[Value]) -> Option<&SearchNode> {
        self.registry
            .lookup(state)
            .and_then(|id| self.space.get(id))
    }

    pub fn statistics(&self) -> WorkerStatistics {
        let mut stats = self.stats.clone();
        stats.elapsed_time = self.started.elapsed();
        stats.registered_states = self.registry.len() as u64;
        stats.frontier_high_water = self.frontier.high_water() as u64;
        stats
    }

    pub fn into_outcome(self) -> WorkerOutcome {
        let statistics = self.statistics();
        WorkerOutcome {
            rank: self.rank,
            plan: self.plan,
            incumbent: self.incumbent.cost(),
            statistics,
        }
    }

    /// Seed the frontier with the initial state if this worker owns it.
    pub fn initialize(&mut self) {
        if self.phase != WorkerPhase::Initializing {
            return;
        }
        self.started = Instant::now();
        self.phase = WorkerPhase::Running;

        let initial = self.task.initial.clone();
        let fingerprint = self.hash.hash(&initial);
        let owner = owner_of(fingerprint, self.world_size);
        debug!(rank = self.rank, owner, fingerprint, "initial state routed");
        if owner != self.rank {
            return;
        }

        let (id, _) = self.registry.build_state(&initial);
        match self.evaluate(&initial) {
            Evaluation::DeadEnd => {
                self.space.node_mut(id).mark_dead_end();
                self.stats.dead_ends += 1;
                warn!(rank = self.rank, "initial state is a dead end");
            }
            Evaluation::Value(h) => {
                self.space.node_mut(id).open_initial(h, fingerprint);
                self.frontier.push(id, 0, h);
                info!(rank = self.rank, fingerprint, h, "seeded initial state");
            }
        }
    }

    /// Advance the worker by one non-blocking step. Returns whether anything
    /// happened, so runtimes can back off when every worker is waiting.
    pub fn step(&mut self) -> bool {
        match self.phase {
            WorkerPhase::Initializing => {
                self.initialize();
                true
            }
            WorkerPhase::Running | WorkerPhase::Draining | WorkerPhase::Terminating => {
                self.search_step()
            }
            WorkerPhase::Reconstructing => self.reconstruction_step(),
            WorkerPhase::Done => false,
        }
    }

    /// Block on the transport for at most `timeout`. Runtimes call this
    /// after a step that did nothing.
    pub fn wait_for_message(&mut self, timeout: Duration) {
        if !self.is_done() {
            self.transport.wait(timeout);
        }
    }

    fn search_step(&mut self) -> bool {
        let received = self.drain_inbox();
        if !self.is_searching() {
            return true;
        }

        if let Some(id) = self.fetch_next() {
            self.phase = WorkerPhase::Running;
            self.termination.on_busy();
            self.process(id);
            self.flush_ready();
            return true;
        }

        if self.flush_all() {
            self.phase = WorkerPhase::Draining;
            return true;
        }

        self.phase = WorkerPhase::Terminating;
        match self.termination.on_idle() {
            TerminationAction::Wait => received,
            TerminationAction::Forward(token) => {
                let next = self.termination.next_rank();
                debug!(rank = self.rank, next, count = token.count, clean = token.clean, "forwarding token");
                self.send(next, Message::TerminationToken(token));
                true
            }
            TerminationAction::Declare => {
                info!(rank = self.rank, laps = self.termination.laps(), "termination detected");
                self.broadcast(Message::FinalTerminate);
                self.begin_reconstruction();
                true
            }
        }
    }

    fn is_searching(&self) -> bool {
        matches!(
            self.phase,
            WorkerPhase::Running | WorkerPhase::Draining | WorkerPhase::Terminating
        )
    }

    /// Handle every available message. Stops early once a message ends the
    /// search; the rest stay queued for reconstruction.
    fn drain_inbox(&mut self) -> bool {
        let mut received = false;
        while let Some(Envelope { from, message }) = self.transport.try_recv() {
            received = true;
            if message.is_work() {
                self.termination.on_work_received();
            }
            match message {
                Message::NodeBatch(payload) => self.receive_batch(from, &payload),
                Message::IncumbentUpdate { cost, owner } => {
                    if self.incumbent.offer(cost, owner) {
                        info!(rank = self.rank, cost, owner, "incumbent improved");
                    }
                }
                Message::TerminationToken(token) => self.termination.on_token(token),
                Message::FinalTerminate => {
                    self.begin_reconstruction();
                    return true;
                }
                Message::PlanContinue {
                    state_ref,
                    operators,
                } => {
                    self.begin_reconstruction();
                    self.walk_plan(state_ref, operators);
                    return true;
                }
                Message::PlanComplete => {
                    self.frontier.clear();
                    self.phase = WorkerPhase::Done;
                    return true;
                }
            }
        }
        received
    }

    /// Pop the best live entry, dropping stale ones. Everything left once
    /// the best f reaches the incumbent is discarded.
    fn fetch_next(&mut self) -> Option<StateId> {
        while let Some((id, g, f)) = self.frontier.pop() {
            let Some(node) = self.space.get(id) else {
                continue;
            };
            if node.status != NodeStatus::Open || node.g != g {
                continue;
            }
            if f >= self.incumbent.bound() {
                let discarded = 1 + self.frontier.len() as u64;
                self.stats.pruned_by_incumbent += discarded;
                self.frontier.clear();
                debug!(rank = self.rank, discarded, bound = self.incumbent.bound(), "frontier pruned");
                return None;
            }
            return Some(id);
        }
        None
    }

    fn process(&mut self, id: StateId) {
        let state = self.registry.shared(id);
        let node = self.space.node_mut(id);
        node.close();
        let (g, fingerprint) = (node.g, node.fingerprint);

        if self.task.is_goal(&state) {
            self.on_goal(id, g);
            return;
        }

        self.stats.expanded += 1;
        let task = Arc::clone(&self.task);
        let hash = Arc::clone(&self.hash);
        for op_id in task.applicable_operators(&state) {
            let op = &task.operators[op_id];
            let child_g = g.saturating_add(op.cost);
            if child_g >= self.incumbent.bound() {
                self.stats.pruned_by_incumbent += 1;
                continue;
            }
            self.stats.generated += 1;

            let child_fp = hash.hash_incremental(&state, fingerprint, op);
            let child = op.apply(&state);
            debug_assert_eq!(child_fp, hash.hash(&child));

            let owner = owner_of(child_fp, self.world_size);
            if owner == self.rank {
                let parent = ParentRef {
                    worker: self.rank,
                    state_ref: id,
                };
                self.admit(&child, child_g, None, op_id, child_fp, parent);
            } else {
                self.route(owner, child, child_g, op_id, child_fp, id);
            }
        }
    }

    fn on_goal(&mut self, id: StateId, g: i32) {
        if g >= self.incumbent.bound() || !self.incumbent.offer(g, self.rank) {
            return;
        }
        self.goal_state = Some(id);
        self.stats.goals_found += 1;
        info!(rank = self.rank, cost = g, "found goal");
        self.broadcast(Message::IncumbentUpdate {
            cost: g,
            owner: self.rank,
        });
    }

    /// Single admission rule for locally generated and received nodes.
    /// `h` is `Some` when the sender already evaluated the state.
    fn admit(
        &mut self,
        state: &[Value],
        g: i32,
        h: Option<i32>,
        op: OperatorId,
        fingerprint: Fingerprint,
        parent: ParentRef,
    ) {
        let (id, _) = self.registry.build_state(state);
        let status = self.space.node_mut(id).status;
        match status {
            NodeStatus::New => {
                let h = match h {
                    Some(h) => h,
                    None => match self.evaluate(state) {
                        Evaluation::Value(h) => h,
                        Evaluation::DeadEnd => {
                            self.space.node_mut(id).mark_dead_end();
                            self.stats.dead_ends += 1;
                            return;
                        }
                    },
                };
                self.space.node_mut(id).open(g, h, op, parent, fingerprint);
                self.frontier.push(id, g, h);
            }
            NodeStatus::Open | NodeStatus::Closed => {
                let node = self.space.node_mut(id);
                if g < node.g {
                    node.reopen(g, op, parent);
                    let h = node.h;
                    if status == NodeStatus::Closed {
                        self.stats.reopened += 1;
                    }
                    self.frontier.push(id, g, h);
                } else {
                    self.stats.duplicates += 1;
                }
            }
            NodeStatus::DeadEnd => self.stats.duplicates += 1,
        }
    }

    /// Evaluate a successor owned by `owner` and append it to that
    /// worker's buffer unless it cannot improve the incumbent.
    fn route(
        &mut self,
        owner: usize,
        child: Vec<Value>,
        g: i32,
        op: OperatorId,
        fingerprint: Fingerprint,
        parent: StateId,
    ) {
        let h = match self.evaluate(&child) {
            Evaluation::Value(h) => h,
            Evaluation::DeadEnd => {
                self.stats.dead_ends += 1;
                return;
            }
        };
        if g.saturating_add(h) >= self.incumbent.bound() {
            self.stats.pruned_by_incumbent += 1;
            return;
        }
        let Some((operator, origin_worker, origin_state)) = record_refs(op, self.rank, parent) else {
            self.stats.protocol_errors += 1;
            warn!(rank = self.rank, op, state = %parent, "node references exceed the record format");
            return;
        };
        let record = NodeRecord {
            state: child,
            g,
            h,
            operator,
            fingerprint,
            origin_worker,
            origin_state,
        };
        trace!(rank = self.rank, owner, g, h, fingerprint, "buffered node");
        let buffer = &mut self.outgoing[owner];
        record.encode_into(&mut buffer.bytes);
        buffer.records += 1;
        self.buffered_bytes += self.record_size;
        self.stats.nodes_sent += 1;
    }

    fn receive_batch(&mut self, from: usize, payload: &[u8]) {
        let batch = decode_batch(payload, self.task.num_vars());
        if batch.trailing > 0 {
            self.stats.protocol_errors += 1;
            warn!(rank = self.rank, from, trailing = batch.trailing, "ignoring incomplete node record");
        }
        for record in batch.records {
            let op = match usize::try_from(record.operator) {
                Ok(op) if op < self.task.operators.len() => op,
                _ => {
                    self.stats.protocol_errors += 1;
                    warn!(rank = self.rank, from, operator = record.operator, "node record names an unknown operator");
                    continue;
                }
            };
            let (Ok(worker), Ok(state_ref)) = (
                usize::try_from(record.origin_worker),
                u32::try_from(record.origin_state),
            ) else {
                self.stats.protocol_errors += 1;
                warn!(rank = self.rank, from, "node record has a negative origin");
                continue;
            };
            if !self.task.is_valid_state(&record.state) {
                self.stats.protocol_errors += 1;
                warn!(rank = self.rank, from, state = ?record.state, "node record holds an out-of-domain state");
                continue;
            }
            self.stats.nodes_received += 1;
            let parent = ParentRef {
                worker,
                state_ref: StateId(state_ref),
            };
            self.admit(
                &record.state,
                record.g,
                Some(record.h),
                op,
                record.fingerprint,
                parent,
            );
        }
    }

    fn evaluate(&mut self, state: &[Value]) -> Evaluation {
        self.stats.evaluated += 1;
        self.heuristic.evaluate(&self.task, state)
    }

    /// Flush destinations past the record threshold, or everything once the
    /// byte cap is exceeded.
    fn flush_ready(&mut self) {
        if self.buffered_bytes > self.config.max_buffered_bytes {
            debug!(rank = self.rank, bytes = self.buffered_bytes, "buffer cap reached");
            self.flush_all();
            return;
        }
        for dest in 0..self.world_size {
            if self.outgoing[dest].records > self.config.flush_threshold {
                self.flush_to(dest);
            }
        }
    }

    fn flush_all(&mut self) -> bool {
        let mut sent = false;
        for dest in 0..self.world_size {
            sent |= self.flush_to(dest);
        }
        sent
    }

    fn flush_to(&mut self, dest: usize) -> bool {
        let buffer = &mut self.outgoing[dest];
        if buffer.records == 0 {
            return false;
        }
        let records = std::mem::take(&mut buffer.records);
        let payload = std::mem::take(&mut buffer.bytes);
        self.buffered_bytes -= payload.len();
        debug!(rank = self.rank, dest, records, "flushing node batch");
        self.stats.batches_sent += 1;
        self.send(dest, Message::NodeBatch(payload));
        true
    }

    fn send(&mut self, to: usize, message: Message) {
        match &message {
            Message::NodeBatch(_) => {}
            Message::IncumbentUpdate { .. } => self.stats.incumbent_messages += 1,
            Message::TerminationToken(_) | Message::FinalTerminate => {
                self.stats.termination_messages += 1
            }
            Message::PlanContinue { .. } | Message::PlanComplete => self.stats.plan_messages += 1,
        }
        if message.is_work() {
            self.termination.on_work_sent();
        }
        self.transport.send(to, message);
    }

    fn broadcast(&mut self, message: Message) {
        for peer in 0..self.world_size {
            if peer != self.rank {
                self.send(peer, message.clone());
            }
        }
    }

    fn begin_reconstruction(&mut self) {
        if !self.is_searching() {
            return;
        }
        self.frontier.clear();
        match self.incumbent.owner() {
            None => {
                info!(rank = self.rank, "search space exhausted without a solution");
                self.phase = WorkerPhase::Done;
            }
            Some(owner) if owner == self.rank => {
                self.phase = WorkerPhase::Reconstructing;
                match self.goal_state {
                    Some(goal) => self.walk_plan(goal, Vec::new()),
                    None => warn!(rank = self.rank, "incumbent owner has no goal state"),
                }
            }
            Some(_) => self.phase = WorkerPhase::Reconstructing,
        }
    }

    fn reconstruction_step(&mut self) -> bool {
        let mut received = false;
        while let Some(Envelope { from, message }) = self.transport.try_recv() {
            received = true;
            match message {
                Message::PlanContinue {
                    state_ref,
                    operators,
                } => self.walk_plan(state_ref, operators),
                Message::PlanComplete => self.phase = WorkerPhase::Done,
                other => debug!(rank = self.rank, from, kind = other.kind(), "ignoring message after termination"),
            }
            if self.phase == WorkerPhase::Done {
                break;
            }
        }
        received
    }

    /// Follow parent links from `state` towards the initial state, handing
    /// the walk to another worker at the first remote parent.
    fn walk_plan(&mut self, mut state: StateId, mut operators: Vec<OperatorId>) {
        loop {
            let Some(node) = self.space.get(state) else {
                warn!(rank = self.rank, state = %state, "plan walk reached an unknown state");
                return;
            };
            match (node.parent, node.creating_op) {
                (Some(parent), Some(op)) => {
                    operators.push(op);
                    if parent.worker == self.rank {
                        state = parent.state_ref;
                        continue;
                    }
                    trace!(rank = self.rank, to = parent.worker, steps = operators.len(), "handing off plan walk");
                    self.send(
                        parent.worker,
                        Message::PlanContinue {
                            state_ref: parent.state_ref,
                            operators,
                        },
                    );
                    return;
                }
                _ => {
                    operators.reverse();
                    match self.task.plan_cost(&operators) {
                        Ok(cost) => {
                            info!(rank = self.rank, steps = operators.len(), cost, "plan reconstructed");
                            self.plan = Some(Plan { operators, cost });
                        }
                        Err(e) => {
                            self.stats.protocol_errors += 1;
                            warn!(rank = self.rank, error = %e, "discarding reconstructed plan");
                        }
                    }
                    self.broadcast(Message::PlanComplete);
                    self.phase = WorkerPhase::Done;
                    return;
                }
            }
        }
    }
}

/// Operator, origin worker and origin state of a node record, or `None`
/// when one of them does not fit the record's signed 32-bit fields.
fn record_refs(op: OperatorId, rank: usize, parent: StateId) -> Option<(i32, i32, i32)> {
    Some((
        i32::try_from(op).ok()?,
        i32::try_from(rank).ok()?,
        i32::try_from(parent.0).ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::external::ExternalTable;
    use crate::heuristic::HeuristicKind;
    use crate::task::{Effect, Fact, Operator, Variable};
    use std::collections::{HashMap, VecDeque};

    /// Transport for a single worker under test: records what it sends and
    /// delivers whatever the test queues.
    struct Loopback {
        rank: usize,
        world_size: usize,
        inbox: VecDeque<Envelope>,
        sent: Vec<(usize, Message)>,
    }

    impl Loopback {
        fn new(rank: usize, world_size: usize) -> Self {
            Self {
                rank,
                world_size,
                inbox: VecDeque::new(),
                sent: Vec::new(),
            }
        }
    }

    impl Transport for Loopback {
        fn rank(&self) -> usize {
            self.rank
        }

        fn world_size(&self) -> usize {
            self.world_size
        }

        fn send(&mut self, to: usize, message: Message) {
            self.sent.push((to, message));
        }

        fn try_recv(&mut self) -> Option<Envelope> {
            self.inbox.pop_front()
        }
    }

    fn flip(name: &str, var: usize) -> Operator {
        Operator {
            name: name.to_string(),
            cost: 1,
            prevail: vec![],
            effects: vec![Effect {
                var,
                pre: Some(0),
                post: 1,
                conditions: vec![],
            }],
        }
    }

    fn two_bit_task() -> Task {
        Task {
            variables: vec![
                Variable {
                    name: "a".to_string(),
                    domain: 2,
                },
                Variable {
                    name: "b".to_string(),
                    domain: 2,
                },
            ],
            operators: vec![flip("set-a", 0), flip("set-b", 1)],
            initial: vec![0, 0],
            goal: vec![Fact::new(0, 1), Fact::new(1, 1)],
        }
    }

    fn table(entries: Vec<(Vec<Value>, Fingerprint)>) -> Arc<DistributionHash> {
        let entries: HashMap<Vec<Value>, Fingerprint> = entries.into_iter().collect();
        Arc::new(DistributionHash::External(ExternalTable::from_entries(
            entries,
        )))
    }

    /// Blind, except that the listed states are dead ends.
    struct DeadStates(Vec<Vec<Value>>);

    impl Heuristic for DeadStates {
        fn evaluate(&mut self, _task: &Task, state: &[Value]) -> Evaluation {
            if self.0.iter().any(|dead| dead.as_slice() == state) {
                Evaluation::DeadEnd
            } else {
                Evaluation::Value(0)
            }
        }

        fn name(&self) -> &str {
            "dead-states"
        }
    }

    fn worker_with(
        rank: usize,
        world_size: usize,
        hash: Arc<DistributionHash>,
        heuristic: Box<dyn Heuristic>,
    ) -> HdaWorker<Loopback> {
        HdaWorker::new(
            Arc::new(two_bit_task()),
            hash,
            heuristic,
            Loopback::new(rank, world_size),
            SearchConfig::default().with_termination_debounce(1),
        )
    }

    fn worker(
        rank: usize,
        world_size: usize,
        hash: Arc<DistributionHash>,
    ) -> HdaWorker<Loopback> {
        worker_with(rank, world_size, hash, HeuristicKind::Blind.build())
    }

    fn run_to_done(w: &mut HdaWorker<Loopback>) {
        for _ in 0..100 {
            if w.is_done() {
                return;
            }
            w.step();
        }
    }

    fn batch(records: &[NodeRecord]) -> Message {
        let mut payload = Vec::new();
        for record in records {
            record.encode_into(&mut payload);
        }
        Message::NodeBatch(payload)
    }

    fn record(state: Vec<Value>, g: i32) -> NodeRecord {
        NodeRecord {
            state,
            g,
            h: 0,
            operator: 0,
            fingerprint: 1,
            origin_worker: 0,
            origin_state: 0,
        }
    }

    #[test]
    fn test_initial_state_opens_only_on_owner() {
        let hash = table(vec![(vec![0, 0], 3)]);
        let mut owner = worker(1, 2, Arc::clone(&hash));
        let mut other = worker(0, 2, hash);
        owner.initialize();
        other.initialize();
        assert_eq!(owner.frontier_len(), 1);
        assert_eq!(other.frontier_len(), 0);
    }

    #[test]
    fn test_duplicate_record_is_idempotent() {
        let mut w = worker(1, 2, table(vec![]));
        w.initialize();
        let r = record(vec![1, 0], 1);
        for _ in 0..2 {
            w.transport.inbox.push_back(Envelope {
                from: 0,
                message: batch(&[r.clone()]),
            });
        }
        w.drain_inbox();
        assert_eq!(w.frontier_len(), 1);
        assert_eq!(w.statistics().duplicates, 1);

        // A more expensive copy never regresses g.
        w.transport.inbox.push_back(Envelope {
            from: 0,
            message: batch(&[record(vec![1, 0], 4)]),
        });
        w.drain_inbox();
        assert_eq!(w.node_for(&[1, 0]).map(|n| n.g), Some(1));
        assert_eq!(w.frontier_len(), 1);
    }

    #[test]
    fn test_cheaper_record_reopens() {
        let mut w = worker(0, 2, table(vec![]));
        w.transport.inbox.push_back(Envelope {
            from: 1,
            message: batch(&[record(vec![1, 0], 5), record(vec![1, 0], 2)]),
        });
        w.drain_inbox();
        let node = w.node_for(&[1, 0]).cloned();
        assert_eq!(node.map(|n| (n.g, n.status)), Some((2, NodeStatus::Open)));
        // The stale entry is skipped when popped.
        assert_eq!(w.frontier_len(), 2);
        assert!(w.fetch_next().is_some());
        assert!(w.fetch_next().is_none());
    }

    #[test]
    fn test_truncated_batch_counts_protocol_error() {
        let mut w = worker(0, 2, table(vec![]));
        let Message::NodeBatch(mut payload) = batch(&[record(vec![0, 1], 1)]) else {
            unreachable!();
        };
        payload.extend_from_slice(&[0; 3]);
        w.transport.inbox.push_back(Envelope {
            from: 1,
            message: Message::NodeBatch(payload),
        });
        w.drain_inbox();
        let stats = w.statistics();
        assert_eq!(stats.protocol_errors, 1);
        assert_eq!(stats.nodes_received, 1);
    }

    #[test]
    fn test_out_of_domain_record_counts_protocol_error() {
        let hash = Arc::new(
            DistributionHash::build(&two_bit_task(), &crate::hash::HashConfig::default())
                .expect("zobrist builds"),
        );
        let mut w = worker(0, 2, hash);
        w.initialize();
        w.transport.inbox.push_back(Envelope {
            from: 1,
            message: batch(&[record(vec![7, 0], 0), record(vec![0, 1], 1)]),
        });
        for _ in 0..5 {
            w.step();
        }
        let stats = w.statistics();
        assert_eq!(stats.protocol_errors, 1);
        assert_eq!(stats.nodes_received, 1);
        assert!(w.node_for(&[7, 0]).is_none());
        assert!(w.node_for(&[0, 1]).is_some());
    }

    #[test]
    fn test_oversized_references_do_not_fit_a_record() {
        assert_eq!(record_refs(3, 1, StateId(5)), Some((3, 1, 5)));
        assert_eq!(record_refs(0, 1, StateId(u32::MAX)), None);
        assert_eq!(record_refs(usize::MAX, 0, StateId(0)), None);
        assert_eq!(record_refs(0, usize::MAX, StateId(0)), None);
    }

    #[test]
    fn test_local_dead_end_is_never_expanded() {
        let dead = DeadStates(vec![vec![1, 0]]);
        let mut w = worker_with(0, 1, table(vec![]), Box::new(dead));
        run_to_done(&mut w);
        assert!(w.is_done());
        let plan = w.plan().cloned().expect("plan around the dead end");
        assert_eq!(plan.operators, vec![1, 0]);
        assert_eq!(plan.cost, 2);
        assert_eq!(w.statistics().dead_ends, 1);
        assert_eq!(
            w.node_for(&[1, 0]).map(|n| n.status),
            Some(NodeStatus::DeadEnd)
        );
    }

    #[test]
    fn test_known_dead_end_ignores_later_records() {
        let dead = DeadStates(vec![vec![1, 0]]);
        let mut w = worker_with(0, 1, table(vec![]), Box::new(dead));
        w.initialize();
        w.step();
        assert_eq!(w.statistics().dead_ends, 1);

        // A remote copy carries its own h and must not revive the state.
        w.transport.inbox.push_back(Envelope {
            from: 0,
            message: batch(&[record(vec![1, 0], 1)]),
        });
        w.drain_inbox();
        let stats = w.statistics();
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.dead_ends, 1);
        assert_eq!(
            w.node_for(&[1, 0]).map(|n| n.status),
            Some(NodeStatus::DeadEnd)
        );
    }

    #[test]
    fn test_remote_dead_end_is_not_sent() {
        // Both successors of the initial state belong to worker 1.
        let hash = table(vec![(vec![0, 0], 0), (vec![1, 0], 1), (vec![0, 1], 1)]);
        let dead = DeadStates(vec![vec![1, 0]]);
        let mut w = worker_with(0, 2, hash, Box::new(dead));
        w.initialize();
        w.step();
        let stats = w.statistics();
        assert_eq!(stats.dead_ends, 1);
        assert_eq!(stats.nodes_sent, 1);
        let Some((_, Message::NodeBatch(payload))) = w
            .transport
            .sent
            .iter()
            .find(|(to, m)| *to == 1 && matches!(m, Message::NodeBatch(_)))
        else {
            panic!("expected a node batch for worker 1");
        };
        let decoded = decode_batch(payload, 2);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].state, vec![0, 1]);
    }

    #[test]
    fn test_dead_initial_state_terminates_without_plan() {
        let dead = DeadStates(vec![vec![0, 0]]);
        let mut w = worker_with(0, 1, table(vec![]), Box::new(dead));
        run_to_done(&mut w);
        assert!(w.is_done());
        assert!(w.plan().is_none());
        assert!(w.incumbent().cost().is_none());
        let stats = w.statistics();
        assert_eq!(stats.dead_ends, 1);
        assert_eq!(stats.expanded, 0);
        assert!(w.transport.sent.is_empty());
    }

    #[test]
    fn test_single_worker_solves_and_reconstructs() {
        let mut w = worker(0, 1, table(vec![]));
        let mut steps = 0;
        while !w.is_done() && steps < 100 {
            w.step();
            steps += 1;
        }
        assert!(w.is_done());
        let plan = w.plan().cloned().expect("plan");
        assert_eq!(plan.cost, 2);
        assert!(two_bit_task().validate_plan(&plan.operators));
        assert!(w.transport.sent.is_empty());
    }

    #[test]
    fn test_remote_successors_are_buffered_and_flushed() {
        // Every successor of the initial state belongs to worker 1.
        let hash = table(vec![(vec![0, 0], 0), (vec![1, 0], 1), (vec![0, 1], 1)]);
        let mut w = worker(0, 2, hash);
        w.initialize();
        w.step();
        let batches: Vec<_> = w
            .transport
            .sent
            .iter()
            .filter(|(to, m)| *to == 1 && matches!(m, Message::NodeBatch(_)))
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(w.statistics().nodes_sent, 2);
        assert_eq!(w.termination.deficit(), 1);
    }

    #[test]
    fn test_incumbent_prunes_frontier() {
        let mut w = worker(0, 1, table(vec![]));
        w.initialize();
        w.transport.inbox.push_back(Envelope {
            from: 0,
            message: Message::IncumbentUpdate { cost: 0, owner: 0 },
        });
        w.drain_inbox();
        assert!(w.fetch_next().is_none());
        assert_eq!(w.frontier_len(), 0);
    }

    #[test]
    fn test_termination_without_incumbent_finishes_without_plan() {
        let mut w = worker(1, 2, table(vec![]));
        w.initialize();
        w.transport.inbox.push_back(Envelope {
            from: 0,
            message: Message::FinalTerminate,
        });
        w.step();
        assert!(w.is_done());
        assert!(w.plan().is_none());
    }
}
