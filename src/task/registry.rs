//! Structural deduplication of state vectors.

use super::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Dense per-process handle of a registered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps state contents to dense [`StateId`]s. Each distinct vector is stored
/// once; the lookup table and the id table share the allocation.
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: Vec<Arc<[Value]>>,
    index: HashMap<Arc<[Value]>, StateId>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `values`, returning its id and whether it was newly inserted.
    pub fn build_state(&mut self, values: &[Value]) -> (StateId, bool) {
        if let Some(&id) = self.index.get(values) {
            return (id, false);
        }
        let id = StateId(self.states.len() as u32);
        let stored: Arc<[Value]> = Arc::from(values);
        self.states.push(Arc::clone(&stored));
        self.index.insert(stored, id);
        (id, true)
    }

    pub fn lookup(&self, values: &[Value]) -> Option<StateId> {
        self.index.get(values).copied()
    }

    /// Contents of a registered state.
    pub fn values(&self, id: StateId) -> &[Value] {
        &self.states[id.index()]
    }

    /// Shared handle to a registered state, for callers that must keep the
    /// values while mutating other parts of their context.
    pub fn shared(&self, id: StateId) -> Arc<[Value]> {
        Arc::clone(&self.states[id.index()])
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_deduplicates() {
        let mut registry = StateRegistry::new();
        let (a, inserted_a) = registry.build_state(&[0, 1, 2]);
        let (b, inserted_b) = registry.build_state(&[0, 1, 2]);
        let (c, inserted_c) = registry.build_state(&[2, 1, 0]);

        assert!(inserted_a);
        assert!(!inserted_b);
        assert!(inserted_c);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.values(c), &[2, 1, 0]);
        assert_eq!(registry.lookup(&[0, 1, 2]), Some(a));
        assert_eq!(registry.lookup(&[1, 1, 1]), None);
    }
}
