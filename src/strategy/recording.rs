//! Program-model recording decorator.

use super::{OperationView, SchedulingStrategy};
use crate::error::ReplayError;
use crate::model::{ProgramEvent, ProgramModel};
use crate::types::EntityId;

/// Wraps any strategy and records a [`ProgramModel`] of each iteration.
///
/// Decisions are forwarded untouched. Each runtime occurrence becomes a step,
/// and each nondeterministic value the inner strategy returns becomes a choice
/// step of the entity that asked for it.
#[derive(Debug)]
pub struct ProgramModelStrategy {
    inner: Box<dyn SchedulingStrategy>,
    model: ProgramModel,
}

impl ProgramModelStrategy {
    /// Decorates `inner`.
    #[must_use]
    pub fn new(inner: Box<dyn SchedulingStrategy>) -> Self {
        Self {
            inner,
            model: ProgramModel::new(),
        }
    }

    /// The wrapped strategy.
    #[must_use]
    pub fn inner(&self) -> &dyn SchedulingStrategy {
        self.inner.as_ref()
    }

    /// Unwraps the decorator.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn SchedulingStrategy> {
        self.inner
    }

    /// Takes the model recorded so far, leaving a fresh one.
    pub fn take_model(&mut self) -> ProgramModel {
        std::mem::take(&mut self.model)
    }
}

impl SchedulingStrategy for ProgramModelStrategy {
    fn next_operation(&mut self, ops: &[OperationView], current: EntityId) -> Option<EntityId> {
        self.inner.next_operation(ops, current)
    }

    fn next_boolean_choice(&mut self, current: EntityId, max_value: u32) -> Option<bool> {
        let value = self.inner.next_boolean_choice(current, max_value)?;
        self.model
            .record_boolean_choice(current, value, self.inner.scheduled_steps());
        Some(value)
    }

    fn next_integer_choice(&mut self, current: EntityId, max_value: u32) -> Option<u32> {
        let value = self.inner.next_integer_choice(current, max_value)?;
        self.model
            .record_integer_choice(current, value, self.inner.scheduled_steps());
        Some(value)
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.model.reset();
        self.inner.prepare_for_next_iteration()
    }

    fn reset(&mut self) {
        self.model.reset();
        self.inner.reset();
    }

    fn scheduled_steps(&self) -> u64 {
        self.inner.scheduled_steps()
    }

    fn has_reached_max_scheduling_steps(&self) -> bool {
        self.inner.has_reached_max_scheduling_steps()
    }

    fn is_fair(&self) -> bool {
        self.inner.is_fair()
    }

    fn description(&self) -> String {
        self.inner.description()
    }

    fn observe(&mut self, event: &ProgramEvent) {
        self.model.record(event, self.inner.scheduled_steps());
        self.inner.observe(event);
    }

    fn notify_scheduling_ended(&mut self, bug_found: bool) {
        if bug_found {
            self.model.set_bug_triggering_step();
        }
        self.inner.notify_scheduling_ended(bug_found);
    }

    fn program_model(&self) -> Option<&ProgramModel> {
        Some(&self.model)
    }

    fn replay_error(&self) -> Option<&ReplayError> {
        self.inner.replay_error()
    }
}
