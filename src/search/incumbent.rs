//! Best known goal cost and the worker holding that goal.

/// Incumbents are ordered by `(cost, owner)`, so every worker converges on
/// the same owner when two goals of equal cost are found concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Incumbent {
    best: Option<(i32, usize)>,
}

impl Incumbent {
    /// Pruning bound: nodes with `f >= bound()` cannot improve the incumbent.
    pub fn bound(&self) -> i32 {
        self.best.map_or(i32::MAX, |(cost, _)| cost)
    }

    pub fn cost(&self) -> Option<i32> {
        self.best.map(|(cost, _)| cost)
    }

    pub fn owner(&self) -> Option<usize> {
        self.best.map(|(_, owner)| owner)
    }

    /// Record `(cost, owner)` if it orders before the current incumbent.
    pub fn offer(&mut self, cost: i32, owner: usize) -> bool {
        match self.best {
            Some(best) if (cost, owner) >= best => false,
            _ => {
                self.best = Some((cost, owner));
                true
            }
        }
    }
}
