//! Local open list ordered by f, then h, then insertion order.

use crate::task::StateId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Ordering key of a frontier entry. Entries compare by f, then h, then
/// creation order, so equal keys pop first-in first-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrontierKey {
    pub f: i32,
    pub h: i32,
    pub creation_order: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    key: FrontierKey,
    state: StateId,
    /// g at insertion; entries whose g no longer matches the node are stale.
    g: i32,
}

/// Best-first frontier. Reopened nodes are pushed again; the old entry is
/// recognized as stale by the caller when popped.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Reverse<FrontierEntry>>,
    next_order: u64,
    high_water: usize,
}

impl Frontier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: StateId, g: i32, h: i32) {
        let key = FrontierKey {
            f: g.saturating_add(h),
            h,
            creation_order: self.next_order,
        };
        self.next_order += 1;
        self.heap.push(Reverse(FrontierEntry { key, state, g }));
        self.high_water = self.high_water.max(self.heap.len());
    }

    /// Best entry as `(state, g at insertion, f)`.
    #[must_use]
    pub fn pop(&mut self) -> Option<(StateId, i32, i32)> {
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.state, entry.g, entry.key.f))
    }

    #[must_use]
    pub fn peek_f(&self) -> Option<i32> {
        self.heap.peek().map(|Reverse(entry)| entry.key.f)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[must_use]
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_order() {
        let mut frontier = Frontier::new();
        frontier.push(StateId(0), 5, 5);
        frontier.push(StateId(1), 3, 2);
        frontier.push(StateId(2), 8, 1);
        frontier.push(StateId(3), 4, 1);

        // f = 10, 5, 9, 5: ties on f broken by h, so state 3 (h=1) first.
        assert_eq!(frontier.pop(), Some((StateId(3), 4, 5)));
        assert_eq!(frontier.pop(), Some((StateId(1), 3, 5)));
        assert_eq!(frontier.pop(), Some((StateId(2), 8, 9)));
        assert_eq!(frontier.pop(), Some((StateId(0), 5, 10)));
        assert!(frontier.pop().is_none());
        assert_eq!(frontier.high_water(), 4);
    }

    #[test]
    fn test_fifo_on_full_ties() {
        let mut frontier = Frontier::new();
        for i in 0..5 {
            frontier.push(StateId(i), 2, 2);
        }
        let order: Vec<u32> = std::iter::from_fn(|| frontier.pop())
            .map(|(s, _, _)| s.0)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clear() {
        let mut frontier = Frontier::new();
        frontier.push(StateId(0), 1, 1);
        assert_eq!(frontier.peek_f(), Some(2));
        frontier.clear();
        assert!(frontier.is_empty());
        assert_eq!(frontier.peek_f(), None);
    }
}
