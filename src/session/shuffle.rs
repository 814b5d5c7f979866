//! Not-yet-played positions for shuffled sessions

use std::collections::VecDeque;

use rand::Rng;

/// Positions in `0..total` that have not surfaced during the current pass
#[derive(Clone, Debug, Default)]
pub struct ShufflePool {
    positions: VecDeque<usize>,
}

impl ShufflePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill with `0..total` in a fresh random order
    pub fn refill(&mut self, total: usize) {
        self.refill_with(total, &mut rand::thread_rng());
    }

    /// Fisher-Yates, walking backwards: each slot swaps with a uniform index in `[0, i]`
    pub fn refill_with<R: Rng + ?Sized>(&mut self, total: usize, rng: &mut R) {
        let mut positions: Vec<usize> = (0..total).collect();
        for i in (1..positions.len()).rev() {
            let j = rng.gen_range(0..=i);
            positions.swap(i, j);
        }
        self.positions = positions.into();
    }

    /// Remove and return the next position
    pub fn take_one(&mut self) -> Option<usize> {
        self.positions.pop_front()
    }

    /// Take up to `count` positions, stopping early when the pool runs dry
    pub fn take(&mut self, count: usize) -> Vec<usize> {
        let n = count.min(self.positions.len());
        self.positions.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}
