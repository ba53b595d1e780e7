//! Round-robin strategy.

use super::{enabled, OperationView, SchedulingStrategy};
use crate::types::EntityId;

/// Gives every enabled entity a turn in id order.
///
/// The first decision of iteration `n` picks the `n`-th enabled entity (modulo
/// the number enabled), so consecutive iterations start differently without any
/// randomness. Value choices alternate deterministically.
#[derive(Debug, Clone)]
pub struct RoundRobinStrategy {
    max_steps: u64,
    scheduled_steps: u64,
    iteration: u64,
    last: Option<EntityId>,
    value_choices: u64,
}

impl RoundRobinStrategy {
    /// Creates a strategy; `max_steps == 0` means unbounded.
    #[must_use]
    pub const fn new(max_steps: u64) -> Self {
        Self {
            max_steps,
            scheduled_steps: 0,
            iteration: 0,
            last: None,
            value_choices: 0,
        }
    }

    fn next_value(&mut self, modulus: u64) -> u64 {
        let value = (self.iteration + self.value_choices) % modulus.max(1);
        self.value_choices += 1;
        self.scheduled_steps += 1;
        value
    }
}

impl SchedulingStrategy for RoundRobinStrategy {
    fn next_operation(&mut self, ops: &[OperationView], _current: EntityId) -> Option<EntityId> {
        let mut candidates = enabled(ops).map(|op| op.id).peekable();
        candidates.peek()?;
        let candidates: Vec<EntityId> = candidates.collect();
        let choice = match self.last {
            None => candidates[(self.iteration % candidates.len() as u64) as usize],
            Some(last) => candidates
                .iter()
                .copied()
                .find(|id| *id > last)
                .unwrap_or(candidates[0]),
        };
        self.last = Some(choice);
        self.scheduled_steps += 1;
        Some(choice)
    }

    fn next_boolean_choice(&mut self, _current: EntityId, _max_value: u32) -> Option<bool> {
        Some(self.next_value(2) == 1)
    }

    fn next_integer_choice(&mut self, _current: EntityId, max_value: u32) -> Option<u32> {
        Some(self.next_value(u64::from(max_value)) as u32)
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.iteration += 1;
        self.scheduled_steps = 0;
        self.value_choices = 0;
        self.last = None;
        true
    }

    fn reset(&mut self) {
        self.iteration = 0;
        self.scheduled_steps = 0;
        self.value_choices = 0;
        self.last = None;
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
        format!("RoundRobin[iteration '{}']", self.iteration)
    }
}
