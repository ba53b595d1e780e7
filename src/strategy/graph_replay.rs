//! Program-model replay.
//!
//! Walks a recorded [`ProgramModel`] instead of a flat decision list. A step is
//! *ready* once all of its predecessors have fired; the ready steps form the
//! frontier. At a scheduling point the candidates are the live enabled entities
//! whose pending operation matches a frontier step of the same (remapped)
//! source and kind, and the candidate whose step was recorded first wins.
//! Observed runtime occurrences fire the frontier step they match, which keeps
//! the frontier in sync with the live program.
//!
//! Entity ids are remapped as creations are observed, and live send indices
//! are mapped to recorded send steps so a receive is matched against the send
//! it actually dequeues.

use super::replay::ReplayPhase;
use super::{enabled, OperationView, SchedulingStrategy};
use crate::error::ReplayError;
use crate::model::{EventDescriptor, ProgramEvent, ProgramModel, StepKind};
use crate::runtime::config::ReplayMismatchPolicy;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{EntityId, OperationType, StepId};
use crate::util::DetHashMap;
use std::collections::BTreeSet;

/// Replays a recorded [`ProgramModel`] step by step.
#[derive(Debug)]
pub struct GraphReplayStrategy {
    guide: ProgramModel,
    fair: bool,
    max_steps: u64,
    policy: ReplayMismatchPolicy,
    suffix: Option<Box<dyn SchedulingStrategy>>,
    phase: ReplayPhase,
    error: Option<ReplayError>,
    fired: Vec<bool>,
    frontier: BTreeSet<StepId>,
    to_live: DetHashMap<EntityId, EntityId>,
    to_guide: DetHashMap<EntityId, EntityId>,
    sends: DetHashMap<u64, StepId>,
    replayed: u64,
}

impl GraphReplayStrategy {
    /// Replays `guide`, recorded by a run whose fairness was `fair`.
    #[must_use]
    pub fn new(guide: ProgramModel, fair: bool) -> Self {
        let mut strategy = Self {
            fired: Vec::new(),
            guide,
            fair,
            max_steps: 0,
            policy: ReplayMismatchPolicy::default(),
            suffix: None,
            phase: ReplayPhase::Replaying,
            error: None,
            frontier: BTreeSet::new(),
            to_live: DetHashMap::default(),
            to_guide: DetHashMap::default(),
            sends: DetHashMap::default(),
            replayed: 0,
        };
        strategy.rewind();
        strategy
    }

    /// Step bound applied while replaying; use the recorded run's bound.
    #[must_use]
    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Mismatch policy.
    #[must_use]
    pub fn policy(mut self, policy: ReplayMismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Strategy taking over once the recording is exhausted.
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

    /// The recording being replayed.
    #[must_use]
    pub const fn guide(&self) -> &ProgramModel {
        &self.guide
    }

    /// Recorded steps not yet matched by the live program.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.fired.iter().filter(|fired| !**fired).count()
    }

    fn rewind(&mut self) {
        self.fired = vec![false; self.guide.len()];
        self.frontier.clear();
        self.to_live.clear();
        self.to_guide.clear();
        self.sends.clear();
        self.to_live.insert(EntityId::HARNESS, EntityId::HARNESS);
        self.to_guide.insert(EntityId::HARNESS, EntityId::HARNESS);
        self.replayed = 0;
        self.phase = ReplayPhase::Replaying;
        self.error = None;
        self.fire(StepId::ROOT);
    }

    fn is_ready(&self, id: StepId) -> bool {
        !self.fired[id.index()]
            && self
                .guide
                .step(id)
                .is_some_and(|step| step.preds().iter().all(|e| self.fired[e.step.index()]))
    }

    fn fire(&mut self, id: StepId) {
        self.fired[id.index()] = true;
        self.frontier.remove(&id);
        let succs: Vec<StepId> = self
            .guide
            .step(id)
            .map(|step| step.succs().iter().map(|e| e.step).collect())
            .unwrap_or_default();
        for succ in succs {
            if self.is_ready(succ) {
                self.frontier.insert(succ);
            }
        }
    }

    fn first_schedulable(&self) -> Option<StepId> {
        self.frontier.iter().copied().find(|id| {
            self.guide
                .step(*id)
                .is_some_and(|step| step.kind.is_schedulable())
        })
    }

    /// Whether the live operation `op` performs the recorded step `id`.
    fn performs(&self, op: &OperationView, id: StepId) -> bool {
        let Some(step) = self.guide.step(id) else {
            return false;
        };
        if !step.kind.is_schedulable()
            || step.kind.operation_type() != Some(op.next_operation)
            || self.to_guide.get(&op.id) != Some(&step.source)
        {
            return false;
        }
        if op.next_operation == OperationType::Receive {
            return step.creation_pred() == self.sends.get(&op.matching_send_index).copied();
        }
        true
    }

    fn switch_to_suffix(&mut self) -> bool {
        if self.suffix.is_some() {
            debug!(replayed = self.replayed, "program model exhausted; switching to suffix");
            self.phase = ReplayPhase::Suffix;
            true
        } else {
            self.fail(ReplayError::ExecutionLongerThanTrace);
            false
        }
    }

    fn mismatch(&mut self, step: Option<StepId>, context: String) -> bool {
        let error = ReplayError::Divergence {
            step: step.map_or(self.guide.len(), StepId::index),
            context,
        };
        if self.policy == ReplayMismatchPolicy::FallBackToSuffix && self.suffix.is_some() {
            warn!(%error, "program model replay diverged; falling back to suffix");
            self.phase = ReplayPhase::Suffix;
            true
        } else {
            self.fail(error);
            false
        }
    }

    fn fail(&mut self, error: ReplayError) {
        warn!(%error, "program model replay failed");
        self.phase = ReplayPhase::Failed;
        self.error = Some(error);
    }

    /// Fires the frontier choice step recorded for `current`, returning its kind.
    ///
    /// `Err(true)` asks the caller to delegate to the suffix, `Err(false)`
    /// means the replay failed.
    fn take_choice(
        &mut self,
        current: EntityId,
        wanted: fn(StepKind) -> bool,
        what: &str,
    ) -> Result<StepKind, bool> {
        if self.frontier.is_empty() {
            return Err(self.switch_to_suffix());
        }
        let source = self.to_guide.get(&current).copied();
        let found = self.frontier.iter().copied().find(|id| {
            self.guide
                .step(*id)
                .is_some_and(|step| Some(step.source) == source && wanted(step.kind))
        });
        match found {
            Some(id) => {
                let kind = self.guide.step(id).map(|step| step.kind);
                self.fire(id);
                self.replayed += 1;
                kind.ok_or(false)
            }
            None => {
                let context = format!("{current} asked for {what} that was not recorded here");
                Err(self.mismatch(self.frontier.first().copied(), context))
            }
        }
    }

    fn descriptor_matches(recorded: Option<&EventDescriptor>, live: &EventDescriptor) -> bool {
        recorded.is_some_and(|recorded| {
            recorded.type_name == live.type_name
                && match (recorded.content_hash, live.content_hash) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
    }

    /// The frontier step matching a live occurrence.
    fn matching_step(&self, event: &ProgramEvent) -> Option<StepId> {
        let source = self.to_guide.get(&event.source()).copied()?;
        self.frontier.iter().copied().find(|id| {
            let Some(step) = self.guide.step(*id) else {
                return false;
            };
            if step.source != source {
                return false;
            }
            match event {
                ProgramEvent::Create { type_name, .. } => {
                    step.kind == StepKind::Create
                        && step.event.as_ref().map(|e| e.type_name.as_str())
                            == Some(type_name.as_str())
                }
                ProgramEvent::Start { .. } => step.kind == StepKind::Start,
                ProgramEvent::Send { target, event, .. } => {
                    step.kind == StepKind::Send
                        && self.to_live.get(&step.target) == Some(target)
                        && Self::descriptor_matches(step.event.as_ref(), event)
                }
                ProgramEvent::Receive {
                    event, send_index, ..
                } => {
                    step.kind == StepKind::Receive
                        && step.creation_pred() == self.sends.get(send_index).copied()
                        && Self::descriptor_matches(step.event.as_ref(), event)
                }
                ProgramEvent::MonitorEvent { monitor, .. } => {
                    step.kind == StepKind::MonitorEvent && step.monitor.as_ref() == Some(monitor)
                }
                ProgramEvent::MonitorStateChange { monitor, hot, .. } => {
                    step.kind == StepKind::MonitorStateChange(*hot)
                        && step.monitor.as_ref() == Some(monitor)
                }
            }
        })
    }
}

impl SchedulingStrategy for GraphReplayStrategy {
    fn next_operation(&mut self, ops: &[OperationView], current: EntityId) -> Option<EntityId> {
        match self.phase {
            ReplayPhase::Suffix => return self.suffix.as_mut()?.next_operation(ops, current),
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        if enabled(ops).next().is_none() {
            return None;
        }
        let Some(expected) = self.first_schedulable() else {
            return if self.switch_to_suffix() {
                self.suffix.as_mut()?.next_operation(ops, current)
            } else {
                None
            };
        };
        let chosen = self.frontier.iter().copied().find_map(|id| {
            enabled(ops)
                .find(|op| self.performs(op, id))
                .map(|op| (id, op.id))
        });
        if let Some(chosen) = chosen {
            trace!(step = %chosen.0, entity = %chosen.1, "graph replay decision");
            self.replayed += 1;
            return Some(chosen.1);
        }
        let context = format!(
            "no enabled entity performs recorded step {}",
            self.guide
                .step(expected)
                .map_or_else(|| expected.to_string(), ToString::to_string)
        );
        if self.mismatch(Some(expected), context) {
            self.suffix.as_mut()?.next_operation(ops, current)
        } else {
            None
        }
    }

    fn next_boolean_choice(&mut self, current: EntityId, max_value: u32) -> Option<bool> {
        match self.phase {
            ReplayPhase::Suffix => {
                return self.suffix.as_mut()?.next_boolean_choice(current, max_value)
            }
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        match self.take_choice(
            current,
            |kind| matches!(kind, StepKind::NondetBool(_)),
            "a boolean",
        ) {
            Ok(StepKind::NondetBool(value)) => Some(value),
            Ok(_) | Err(false) => None,
            Err(true) => self.suffix.as_mut()?.next_boolean_choice(current, max_value),
        }
    }

    fn next_integer_choice(&mut self, current: EntityId, max_value: u32) -> Option<u32> {
        match self.phase {
            ReplayPhase::Suffix => {
                return self.suffix.as_mut()?.next_integer_choice(current, max_value)
            }
            ReplayPhase::Failed => return None,
            ReplayPhase::Replaying => {}
        }
        match self.take_choice(
            current,
            |kind| matches!(kind, StepKind::NondetInt(_)),
            "an integer",
        ) {
            Ok(StepKind::NondetInt(value)) => Some(value),
            Ok(_) | Err(false) => None,
            Err(true) => self.suffix.as_mut()?.next_integer_choice(current, max_value),
        }
    }

    fn prepare_for_next_iteration(&mut self) -> bool {
        self.reset();
        false
    }

    fn reset(&mut self) {
        self.rewind();
        if let Some(suffix) = self.suffix.as_mut() {
            suffix.reset();
        }
    }

    fn scheduled_steps(&self) -> u64 {
        self.replayed + self.suffix.as_ref().map_or(0, |s| s.scheduled_steps())
    }

    fn has_reached_max_scheduling_steps(&self) -> bool {
        match (self.phase, self.suffix.as_ref()) {
            (ReplayPhase::Suffix, Some(suffix)) => suffix.has_reached_max_scheduling_steps(),
            _ => self.max_steps > 0 && self.replayed >= self.max_steps,
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
            Some(suffix) => format!("GraphReplay({})", suffix.description()),
            None => "GraphReplay".to_string(),
        }
    }

    fn observe(&mut self, event: &ProgramEvent) {
        if self.phase != ReplayPhase::Replaying {
            if let Some(suffix) = self.suffix.as_mut() {
                suffix.observe(event);
            }
            return;
        }
        let Some(id) = self.matching_step(event) else {
            let context = format!("unrecorded occurrence {event:?}");
            self.mismatch(self.first_schedulable(), context);
            return;
        };
        if let Some(step) = self.guide.step(id) {
            match event {
                ProgramEvent::Create { created, .. } => {
                    self.to_live.insert(step.target, *created);
                    self.to_guide.insert(*created, step.target);
                }
                ProgramEvent::Send { send_index, .. } if !self.guide.is_dropped_send(id) => {
                    self.sends.insert(*send_index, id);
                }
                _ => {}
            }
        }
        self.fire(id);
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
