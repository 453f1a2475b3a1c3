//! Per-state search bookkeeping.

use crate::hash::Fingerprint;
use crate::task::{OperatorId, StateId};

/// Lifecycle of a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    New,
    Open,
    Closed,
    DeadEnd,
}

/// Parent of a node: the worker that generated it and that worker's state
/// handle. When `worker` is the local rank, `state_ref` is a local
/// [`StateId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef {
    pub worker: usize,
    pub state_ref: StateId,
}

#[derive(Debug, Clone, Default)]
pub struct SearchNode {
    pub status: NodeStatus,
    pub g: i32,
    pub h: i32,
    /// Operator that produced this node; `None` for the initial state.
    pub creating_op: Option<OperatorId>,
    pub parent: Option<ParentRef>,
    pub fingerprint: Fingerprint,
}

impl SearchNode {
    pub fn f(&self) -> i32 {
        self.g.saturating_add(self.h)
    }

    /// Open the node as the initial state.
    pub fn open_initial(&mut self, h: i32, fingerprint: Fingerprint) {
        self.status = NodeStatus::Open;
        self.g = 0;
        self.h = h;
        self.creating_op = None;
        self.parent = None;
        self.fingerprint = fingerprint;
    }

    pub fn open(
        &mut self,
        g: i32,
        h: i32,
        op: OperatorId,
        parent: ParentRef,
        fingerprint: Fingerprint,
    ) {
        self.status = NodeStatus::Open;
        self.g = g;
        self.h = h;
        self.creating_op = Some(op);
        self.parent = Some(parent);
        self.fingerprint = fingerprint;
    }

    /// Reopen with a cheaper path; h and fingerprint are properties of the
    /// state and stay as they are.
    pub fn reopen(&mut self, g: i32, op: OperatorId, parent: ParentRef) {
        self.status = NodeStatus::Open;
        self.g = g;
        self.creating_op = Some(op);
        self.parent = Some(parent);
    }

    pub fn close(&mut self) {
        self.status = NodeStatus::Closed;
    }

    pub fn mark_dead_end(&mut self) {
        self.status = NodeStatus::DeadEnd;
    }
}

/// Search nodes indexed by [`StateId`].
#[derive(Debug, Default)]
pub struct SearchSpace {
    nodes: Vec<SearchNode>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for `id`, created as [`NodeStatus::New`] on first access.
    pub fn node_mut(&mut self, id: StateId) -> &mut SearchNode {
        let index = id.index();
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, SearchNode::default);
        }
        &mut self.nodes[index]
    }

    pub fn get(&self, id: StateId) -> Option<&SearchNode> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
