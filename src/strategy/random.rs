//! Seeded random strategy.

use super::{enabled, OperationView, SchedulingStrategy};
use crate::types::EntityId;
use crate::util::DetRng;
use smallvec::SmallVec;

/// Uniformly random choices from a seeded generator.
///
/// The generator is not reseeded between iterations, so successive iterations
/// explore different schedules while the whole campaign stays a function of the
/// seed.
#[derive(Debug, Clone)]
pub struct RandomStrategy {
    seed: u64,
    rng: DetRng,
    max_steps: u64,
    scheduled_steps: u64,
}

impl RandomStrategy {
    /// Creates a strategy; `max_steps == 0` means unbounded.
    #[must_use]
    pub const fn new(seed: u64, max_steps: u64) -> Self {
        Self {
            seed,
            rng: DetRng::new(seed),
            max_steps,
            scheduled_steps: 0,
        }
    }

    /// The seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl SchedulingStrategy for RandomStrategy {
    fn next_operation(&mut self, ops: &[OperationView], _current: EntityId) -> Option<EntityId> {
        let candidates: SmallVec<[EntityId; 8]> = enabled(ops).map(|op| op.id).collect();
        if candidates.is_empty() {
            return None;
        }
        let index = self.rng.next_usize(candidates.len());
        self.scheduled_steps += 1;
        Some(candidates[index])
    }

    fn next_boolean_choice(&mut self, _current: EntityId, max_value: u32) -> Option<bool> {
        self.scheduled_steps += 1;
        Some(self.rng.next_below(max_value.max(1)) == 0)
    }

    fn next_integer_choice(&mut self, _current: EntityId, max_value: u32) -> Option<u32> {
        self.scheduled_steps += 1;
        Some(self.rng.next_below(max_value))
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.scheduled_steps = 0;
        true
    }

    fn reset(&mut self) {
        self.rng = DetRng::new(self.seed);
        self.scheduled_steps = 0;
    }

    fn scheduled_steps(&self) -> u64 {
        self.scheduled_steps
    }

    fn has_reached_max_scheduling_steps(&self) -> bool {
        self.max_steps > 0 && self.scheduled_steps >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("Random[seed '{}']", self.seed)
    }
}
