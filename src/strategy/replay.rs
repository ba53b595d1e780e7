//! Flat schedule-trace replay.
//!
//! # Phases
//!
//! ```text
//! Replaying --(trace exhausted, suffix configured)--------------> Suffix
//! Replaying --(mismatch, FallBackToSuffix + suffix configured)--> Suffix
//! Replaying --(mismatch otherwise, or exhausted w/o suffix)-----> Failed
//! ```
//!
//! In `Failed` every decision returns `None` and [`replay_error`] reports why,
//! which the scheduler turns into a replay-divergence bug.
//!
//! [`replay_error`]: SchedulingStrategy::replay_error

use super::{enabled, OperationView, SchedulingStrategy};
use crate::error::ReplayError;
use crate::model::ProgramEvent;
use crate::runtime::config::ReplayMismatchPolicy;
use crate::trace::{ScheduleStep, ScheduleTrace};
use crate::tracing_compat::{debug, warn};
use crate::types::EntityId;

/// Where a replay currently takes its decisions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    /// Decisions come from the recording.
    Replaying,
    /// Decisions come from the suffix strategy.
    Suffix,
    /// The replay failed; no further decisions are produced.
    Failed,
}

/// Replays a [`ScheduleTrace`] decision by decision.
#[derive(Debug)]
pub struct ReplayStrategy {
    trace: ScheduleTrace,
    cursor: usize,
    max_steps: u64,
    fair: bool,
    policy: ReplayMismatchPolicy,
    suffix: Option<Box<dyn SchedulingStrategy>>,
    phase: ReplayPhase,
    error: Option<ReplayError>,
}

impl ReplayStrategy {
    /// Replays `trace` with no step bound, no suffix, and the default policy.
    #[must_use]
    pub fn new(trace: ScheduleTrace) -> Self {
        Self {
            trace,
            cursor: 0,
            max_steps: 0,
            fair: true,
            policy: ReplayMismatchPolicy::default(),
            suffix: None,
            phase: ReplayPhase::Replaying,
            error: None,
        }
    }

    /// Step bound applied while replaying; use the recorded run's bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Fairness of the recorded run.
    #[must_use]
    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    /// Mismatch policy.
    #[must_use]
    pub fn policy(mut self, policy: ReplayMismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Strategy taking over once the trace is exhausted.
    #[must_use]
    pub fn suffix(mut self, suffix: Box<dyn SchedulingStrategy>) -> Self {
        self.suffix = Some(suffix);
        self
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ReplayPhase {
        self.phase
    }

    /// Decisions replayed from the trace.
    #[must_use]
    pub const fn replayed(&self) -> usize {
        self.cursor
    }

    fn exhausted(&mut self) -> bool {
        if self.suffix.is_some() {
            debug!(replayed = self.cursor, "schedule trace exhausted; switching to suffix");
            self.phase = ReplayPhase::Suffix;
            true
        } else {
            self.fail(ReplayError::ExecutionLongerThanTrace);
            false
        }
    }

    fn mismatch(&mut self, error: ReplayError) -> bool {
        if self.policy == ReplayMismatchPolicy::FallBackToSuffix && self.suffix.is_some() {
            warn!(cursor = self.cursor, %error, "replay mismatch; falling back to suffix");
            self.phase = ReplayPhase::Suffix;
            true
        } else {
            self.fail(error);
            false
        }
    }

    fn fail(&mut self, error: ReplayError) {
        warn!(cursor = self.cursor, %error, "replay failed");
        self.phase = ReplayPhase::Failed;
        self.error = Some(error);
    }

    /// Takes the next recorded step when it is of the requested kind.
    ///
    /// Returns `Err(true)` when the caller should delegate to the suffix and
    /// `Err(false)` when the replay failed.
    fn take(&mut self, expected: &'static str) -> Result<ScheduleStep, bool> {
        let Some(step) = self.trace.get(self.cursor).cloned() else {
            return Err(self.exhausted());
        };
        if step.describe_kind() != expected {
            return Err(self.mismatch(ReplayError::UnexpectedChoice { expected }));
        }
        self.cursor += 1;
        Ok(step)
    }

    fn suffix_mut(&mut self) -> Option<&mut Box<dyn SchedulingStrategy>> {
        self.suffix.as_mut()
    }
}

impl SchedulingStrategy for ReplayStrategy {
    fn next_operation(&mut self, ops: &[OperationView], current: EntityId) -> Option<EntityId> {
        match self.phase {
            ReplayPhase::Suffix => return self.suffix_mut()?.next_operation(ops, current),
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        if enabled(ops).next().is_none() {
            return None;
        }
        let Some(step) = self.trace.get(self.cursor).cloned() else {
            return if self.exhausted() {
                self.suffix_mut()?.next_operation(ops, current)
            } else {
                None
            };
        };
        let error = match step {
            ScheduleStep::SchedulingChoice { entity } => {
                if enabled(ops).any(|op| op.id == entity) {
                    self.cursor += 1;
                    return Some(entity);
                }
                ReplayError::UnknownEntity {
                    entity: entity.as_u64(),
                }
            }
            _ => ReplayError::UnexpectedChoice {
                expected: "a scheduling choice",
            },
        };
        if self.mismatch(error) {
            self.suffix_mut()?.next_operation(ops, current)
        } else {
            None
        }
    }

    fn next_boolean_choice(&mut self, current: EntityId, max_value: u32) -> Option<bool> {
        match self.phase {
            ReplayPhase::Suffix => {
                return self.suffix_mut()?.next_boolean_choice(current, max_value)
            }
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        match self.take("a nondeterministic boolean choice") {
            Ok(ScheduleStep::BooleanChoice { value, .. }) => Some(value),
            Ok(_) | Err(false) => None,
            Err(true) => self.suffix_mut()?.next_boolean_choice(current, max_value),
        }
    }

    fn next_integer_choice(&mut self, current: EntityId, max_value: u32) -> Option<u32> {
        match self.phase {
            ReplayPhase::Suffix => {
                return self.suffix_mut()?.next_integer_choice(current, max_value)
            }
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        match self.take("a nondeterministic integer choice") {
            Ok(ScheduleStep::IntegerChoice { value }) => Some(value),
            Ok(_) | Err(false) => None,
            Err(true) => self.suffix_mut()?.next_integer_choice(current, max_value),
        }
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.reset();
        false
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.phase = ReplayPhase::Replaying;
        self.error = None;
        if let Some(suffix) = self.suffix.as_mut() {
            suffix.reset();
        }
    }

    fn scheduled_steps(&self) -> u64 {
        self.cursor as u64 + self.suffix.as_ref().map_or(0, |s| s.scheduled_steps())
    }

    fn has_reached_max_scheduling_steps(&self) -> bool {
        match (self.phase, self.suffix.as_ref()) {
            (ReplayPhase::Suffix, Some(suffix)) => suffix.has_reached_max_scheduling_steps(),
            _ => self.max_steps > 0 && self.cursor as u64 >= self.max_steps,
        }
    }

    fn is_fair(&self) -> bool {
        match (self.phase, self.suffix.as_ref()) {
            (ReplayPhase::Suffix, Some(suffix)) => suffix.is_fair(),
            _ => self.fair,
        }
    }

    fn description(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("Replay({})", suffix.description()),
            None => "Replay".to_string(),
        }
    }

    fn observe(&mut self, event: &ProgramEvent) {
        if let Some(suffix) = self.suffix.as_mut() {
            suffix.observe(event);
        }
    }

    fn notify_scheduling_ended(&mut self, bug_found: bool) {
        if let Some(suffix) = self.suffix.as_mut() {
            suffix.notify_scheduling_ended(bug_found);
        }
    }

    fn replay_error(&self) -> Option<&ReplayError> {
        self.error.as_ref()
    }
}
