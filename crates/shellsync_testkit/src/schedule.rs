//! Seeded delivery schedules.
//!
//! A schedule turns the engine's publish order into a transport delivery
//! order: updates are shuffled inside fixed windows and some are delivered
//! a second time a little later. Every update is still delivered at least
//! once, which is all the push channel promises.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Reorder and duplication parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySchedule {
    /// RNG seed; equal seeds give equal plans.
    pub seed: u64,
    /// Size of the windows shuffled independently. 1 keeps order.
    pub reorder_window: usize,
    /// Probability in `[0, 1]` that an update is delivered twice.
    pub duplicate_rate: f64,
}

impl DeliverySchedule {
    /// Creates a schedule with a moderate amount of disorder.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            reorder_window: 4,
            duplicate_rate: 0.1,
        }
    }

    /// Creates a schedule that delivers everything once, in order.
    pub fn in_order() -> Self {
        Self {
            seed: 0,
            reorder_window: 1,
            duplicate_rate: 0.0,
        }
    }

    /// Sets the reorder window.
    pub fn with_reorder_window(mut self, window: usize) -> Self {
        self.reorder_window = window;
        self
    }

    /// Sets the duplicate rate.
    pub fn with_duplicate_rate(mut self, rate: f64) -> Self {
        self.duplicate_rate = rate;
        self
    }

    /// Returns delivery order as indices into a list of `len` items.
    ///
    /// Every index in `0..len` appears at least once.
    pub fn plan_indices(&self, len: usize) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let window = self.reorder_window.max(1);
        let rate = if self.duplicate_rate.is_finite() {
            self.duplicate_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut order: Vec<usize> = (0..len).collect();
        for chunk in order.chunks_mut(window) {
            chunk.shuffle(&mut rng);
        }

        // Originals sort at even slots, duplicates at odd slots a few
        // positions later.
        let mut keyed: Vec<(usize, usize)> = Vec::with_capacity(len);
        for (pos, idx) in order.into_iter().enumerate() {
            keyed.push((pos * 2, idx));
            if rate > 0.0 && rng.gen_bool(rate) {
                let delay = rng.gen_range(0..window * 2);
                keyed.push(((pos + delay) * 2 + 1, idx));
            }
        }
        keyed.sort_by_key(|(slot, _)| *slot);
        keyed.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Returns `items` in delivery order.
    pub fn plan<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.plan_indices(items.len())
            .into_iter()
            .map(|idx| items[idx].clone())
            .collect()
    }
}

impl Default for DeliverySchedule {
    fn default() -> Self {
        Self::in_order()
    }
}
