//! Program model: a partially ordered record of one run.
//!
//! Every scheduling-relevant occurrence (create, start, send, receive,
//! nondeterministic choice, monitor notification) becomes a [`ProgramStep`] in
//! an append-only arena. Steps are linked by typed edges that capture the
//! orderings a faithful replay must respect:
//!
//! - **program order** along each entity's control flow
//! - **creation** from a create to the created entity's start, and from a send
//!   to the receive that consumed it
//! - **inbox order** between successive sends into one inbox and successive
//!   receives out of it
//! - **monitor order** between the schedulable steps that anchor successive
//!   notifications of one monitor
//!
//! Edges only ever point from an older step to a newer one, so the graph is
//! acyclic and every predecessor has a smaller [`StepId`].

pub mod event;
pub mod step;
pub mod trace;

pub use event::ProgramEvent;
pub use step::{Edge, EdgeKind, EventDescriptor, ProgramStep, StepKind};
pub use trace::{ProgramTrace, TraceStep, PROGRAM_TRACE_VERSION};

use crate::tracing_compat::{trace as trace_log, warn};
use crate::types::{EntityId, StepId};
use crate::util::DetHashMap;
use std::collections::{BTreeMap, BTreeSet};

/// Bookkeeping used while steps are appended. Not part of the recorded run.
#[derive(Debug, Clone, Default)]
struct Frontier {
    last_step: DetHashMap<EntityId, StepId>,
    last_schedulable: DetHashMap<EntityId, StepId>,
    create_step: DetHashMap<EntityId, StepId>,
    latest_send_to: DetHashMap<EntityId, StepId>,
    latest_receive: DetHashMap<EntityId, StepId>,
    pending_sends: DetHashMap<u64, StepId>,
    monitor_anchor: DetHashMap<String, StepId>,
    hot_monitors: BTreeMap<String, StepId>,
}

/// The step DAG of one run.
#[derive(Debug, Clone)]
pub struct ProgramModel {
    steps: Vec<ProgramStep>,
    entity_types: BTreeMap<EntityId, String>,
    bug_triggering_step: Option<StepId>,
    dropped_sends: BTreeSet<StepId>,
    frontier: Frontier,
    recording: bool,
}

impl Default for ProgramModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramModel {
    /// Creates a model holding only the root step, owned by the harness.
    #[must_use]
    pub fn new() -> Self {
        let root = ProgramStep::new(
            StepId::ROOT,
            StepKind::Start,
            EntityId::HARNESS,
            EntityId::HARNESS,
        );
        let mut frontier = Frontier::default();
        frontier.last_step.insert(EntityId::HARNESS, StepId::ROOT);
        frontier
            .last_schedulable
            .insert(EntityId::HARNESS, StepId::ROOT);
        Self {
            steps: vec![root],
            entity_types: BTreeMap::new(),
            bug_triggering_step: None,
            dropped_sends: BTreeSet::new(),
            frontier,
            recording: true,
        }
    }

    /// Discards everything and starts over with a fresh root.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Stops appending steps; later `record` calls are ignored.
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Whether `record` still appends steps.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    /// The distinguished root step.
    #[must_use]
    pub fn root(&self) -> &ProgramStep {
        &self.steps[0]
    }

    /// All steps in execution order, root first.
    #[must_use]
    pub fn ordered_steps(&self) -> &[ProgramStep] {
        &self.steps
    }

    /// Looks up a step.
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&ProgramStep> {
        self.steps.get(id.index())
    }

    /// Number of steps, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether only the root step exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.len() <= 1
    }

    /// Actor type recorded for `entity` at creation.
    #[must_use]
    pub fn entity_type(&self, entity: EntityId) -> Option<&str> {
        self.entity_types.get(&entity).map(String::as_str)
    }

    /// Whether the send step was dropped because its target had halted.
    #[must_use]
    pub fn is_dropped_send(&self, step: StepId) -> bool {
        self.dropped_sends.contains(&step)
    }

    /// The step blamed for the bug, once set.
    #[must_use]
    pub const fn bug_triggering_step(&self) -> Option<StepId> {
        self.bug_triggering_step
    }

    /// Marks the step blamed for a bug. Only the first call has an effect.
    ///
    /// A monitor that is still hot is a liveness finding and its last hot
    /// transition is blamed; otherwise the most recent step is.
    pub fn set_bug_triggering_step(&mut self) {
        if self.bug_triggering_step.is_some() {
            return;
        }
        let hot = self.frontier.hot_monitors.values().max().copied();
        let last = self.steps.last().map(|step| step.id);
        self.bug_triggering_step = hot.or(last);
    }

    /// Appends the step for a runtime occurrence.
    ///
    /// `scheduled_at` is the number of strategy decisions made so far.
    pub fn record(&mut self, event: &ProgramEvent, scheduled_at: u64) -> Option<StepId> {
        if !self.recording {
            return None;
        }
        let id = match event {
            ProgramEvent::Create {
                creator,
                created,
                type_name,
            } => {
                let id = self.push(StepKind::Create, *creator, *created, scheduled_at)?;
                self.steps[id.index()].event = Some(EventDescriptor::named(type_name.clone()));
                self.follow_program_order(*creator, id, true);
                self.frontier.create_step.insert(*created, id);
                self.frontier.latest_send_to.insert(*created, id);
                self.entity_types.insert(*created, type_name.clone());
                id
            }
            ProgramEvent::Start { entity } => {
                let id = self.push(StepKind::Start, *entity, *entity, scheduled_at)?;
                if let Some(create) = self.frontier.create_step.get(entity).copied() {
                    self.link(create, id, EdgeKind::Creation);
                }
                self.follow_program_order(*entity, id, true);
                self.frontier.latest_receive.insert(*entity, id);
                id
            }
            ProgramEvent::Send {
                sender,
                target,
                event,
                send_index,
                enqueued,
            } => {
                let id = self.push(StepKind::Send, *sender, *target, scheduled_at)?;
                let step = &mut self.steps[id.index()];
                step.event = Some(event.clone());
                step.send_index = *send_index;
                self.follow_program_order(*sender, id, true);
                if let Some(prev) = self.frontier.latest_send_to.insert(*target, id) {
                    self.link(prev, id, EdgeKind::Inbox);
                }
                if *enqueued {
                    self.frontier.pending_sends.insert(*send_index, id);
                } else {
                    self.dropped_sends.insert(id);
                }
                id
            }
            ProgramEvent::Receive {
                receiver,
                event,
                send_index,
            } => {
                let id = self.push(StepKind::Receive, *receiver, *receiver, scheduled_at)?;
                let step = &mut self.steps[id.index()];
                step.event = Some(event.clone());
                step.send_index = *send_index;
                if let Some(send) = self.frontier.pending_sends.remove(send_index) {
                    self.link(send, id, EdgeKind::Creation);
                } else {
                    trace_log!(send_index, receiver = %receiver, "receive without a recorded send");
                }
                self.follow_program_order(*receiver, id, true);
                if let Some(prev) = self.frontier.latest_receive.insert(*receiver, id) {
                    self.link(prev, id, EdgeKind::Inbox);
                }
                id
            }
            ProgramEvent::MonitorEvent {
                source,
                monitor,
                event,
            } => {
                let id = self.push(StepKind::MonitorEvent, *source, *source, scheduled_at)?;
                let step = &mut self.steps[id.index()];
                step.event = Some(event.clone());
                step.monitor = Some(monitor.clone());
                self.follow_program_order(*source, id, false);
                if let Some(anchor) = self.frontier.last_schedulable.get(source).copied() {
                    if let Some(prev) = self.frontier.monitor_anchor.insert(monitor.clone(), anchor)
                    {
                        self.link(prev, anchor, EdgeKind::Monitor);
                    }
                }
                id
            }
            ProgramEvent::MonitorStateChange {
                source,
                monitor,
                hot,
            } => {
                let kind = StepKind::MonitorStateChange(*hot);
                let id = self.push(kind, *source, *source, scheduled_at)?;
                self.steps[id.index()].monitor = Some(monitor.clone());
                self.follow_program_order(*source, id, false);
                if *hot {
                    self.frontier.hot_monitors.insert(monitor.clone(), id);
                } else {
                    self.frontier.hot_monitors.remove(monitor);
                }
                id
            }
        };
        Some(id)
    }

    /// Appends a nondeterministic boolean choice made by `source`.
    pub fn record_boolean_choice(
        &mut self,
        source: EntityId,
        value: bool,
        scheduled_at: u64,
    ) -> Option<StepId> {
        self.record_choice(StepKind::NondetBool(value), source, scheduled_at)
    }

    /// Appends a nondeterministic integer choice made by `source`.
    pub fn record_integer_choice(
        &mut self,
        source: EntityId,
        value: u32,
        scheduled_at: u64,
    ) -> Option<StepId> {
        self.record_choice(StepKind::NondetInt(value), source, scheduled_at)
    }

    fn record_choice(
        &mut self,
        kind: StepKind,
        source: EntityId,
        scheduled_at: u64,
    ) -> Option<StepId> {
        if !self.recording {
            return None;
        }
        let id = self.push(kind, source, source, scheduled_at)?;
        self.follow_program_order(source, id, false);
        Some(id)
    }

    /// Appends a step. `None` once the `u32` step index space is used up.
    fn push(
        &mut self,
        kind: StepKind,
        source: EntityId,
        target: EntityId,
        scheduled_at: u64,
    ) -> Option<StepId> {
        let Some(id) = step_id_at(self.steps.len()) else {
            warn!(steps = self.steps.len(), "program model is full; step dropped");
            return None;
        };
        let mut step = ProgramStep::new(id, kind, source, target);
        step.scheduled_at = scheduled_at;
        self.steps.push(step);
        Some(id)
    }

    fn follow_program_order(&mut self, entity: EntityId, id: StepId, schedulable: bool) {
        if let Some(prev) = self.frontier.last_step.insert(entity, id) {
            self.link(prev, id, EdgeKind::Program);
        }
        if schedulable {
            self.frontier.last_schedulable.insert(entity, id);
        }
    }

    /// Adds `from -> to` unless it would point backwards or duplicate an edge.
    fn link(&mut self, from: StepId, to: StepId, kind: EdgeKind) {
        if from >= to {
            trace_log!(from = %from, to = %to, ?kind, "skipping non-forward edge");
            return;
        }
        if self.steps[to.index()].preds.iter().any(|e| e.step == from) {
            return;
        }
        self.steps[to.index()].preds.push(Edge { kind, step: from });
        self.steps[from.index()].succs.push(Edge { kind, step: to });
    }

    /// Serializes the model as a JSON program trace.
    pub fn serialize_trace(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_trace())?)
    }

    /// Rebuilds a model from [`serialize_trace`](Self::serialize_trace) output.
    pub fn from_trace_str(text: &str) -> crate::Result<Self> {
        let trace: ProgramTrace = serde_json::from_str(text)?;
        Self::from_trace(trace)
    }

    /// Serializes the model as MessagePack.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(&self.to_trace())?)
    }

    /// Rebuilds a model from [`to_bytes`](Self::to_bytes) output.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let trace: ProgramTrace = rmp_serde::from_slice(bytes)?;
        Self::from_trace(trace)
    }

    /// Converts the model into its interchange form.
    #[must_use]
    pub fn to_trace(&self) -> ProgramTrace {
        ProgramTrace {
            version: PROGRAM_TRACE_VERSION,
            steps: self.steps.iter().map(TraceStep::from).collect(),
            entity_types: self
                .entity_types
                .iter()
                .map(|(id, name)| (*id, name.clone()))
                .collect(),
            bug_triggering_step: self.bug_triggering_step,
            dropped_sends: self.dropped_sends.iter().copied().collect(),
        }
    }

    /// Rebuilds a read-only model from its interchange form.
    pub fn from_trace(trace: ProgramTrace) -> crate::Result<Self> {
        trace.validate()?;
        let mut steps: Vec<ProgramStep> = Vec::with_capacity(trace.steps.len());
        for recorded in trace.steps {
            let mut step =
                ProgramStep::new(recorded.index, recorded.kind, recorded.source, recorded.target);
            step.event = recorded.event;
            step.monitor = recorded.monitor;
            step.send_index = recorded.send_index;
            step.scheduled_at = recorded.scheduled_at;
            for edge in &recorded.preds {
                steps[edge.step.index()].succs.push(Edge {
                    kind: edge.kind,
                    step: recorded.index,
                });
            }
            step.preds = recorded.preds.into_iter().collect();
            steps.push(step);
        }
        Ok(Self {
            steps,
            entity_types: trace.entity_types.into_iter().collect(),
            bug_triggering_step: trace.bug_triggering_step,
            dropped_sends: trace.dropped_sends.into_iter().collect(),
            frontier: Frontier::default(),
            recording: false,
        })
    }
}

/// Id of the step stored at arena position `len`, if it fits a [`StepId`].
fn step_id_at(len: usize) -> Option<StepId> {
    u32::try_from(len).ok().map(StepId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn e(raw: u64) -> EntityId {
        EntityId::new(raw)
    }

    fn ping_pong_model() -> ProgramModel {
        let mut model = ProgramModel::new();
        let ping = EventDescriptor::named("Ping");
        model.record(
            &ProgramEvent::Create {
                creator: EntityId::HARNESS,
                created: e(1),
                type_name: "Client".into(),
            },
            0,
        );
        model.record(&ProgramEvent::Start { entity: e(1) }, 0);
        model.record(
            &ProgramEvent::Create {
                creator: e(1),
                created: e(2),
                type_name: "Server".into(),
            },
            1,
        );
        model.record(&ProgramEvent::Start { entity: e(2) }, 2);
        model.record(
            &ProgramEvent::Send {
                sender: e(1),
                target: e(2),
                event: ping.clone(),
                send_index: 3,
                enqueued: true,
            },
            3,
        );
        model.record_boolean_choice(e(2), true, 4);
        model.record(
            &ProgramEvent::Receive {
                receiver: e(2),
                event: ping,
                send_index: 3,
            },
            5,
        );
        model
    }

    #[test]
    fn edges_follow_creation_and_messages() {
        init_test("edges_follow_creation_and_messages");
        let model = ping_pong_model();
        let steps = model.ordered_steps();
        crate::assert_with_log!(steps.len() == 8, "step count", 8, steps.len());

        let start_server = &steps[4];
        crate::assert_with_log!(
            start_server.creation_pred() == Some(StepId::new(3)),
            "start follows create",
            Some(StepId::new(3)),
            start_server.creation_pred()
        );

        let receive = &steps[7];
        crate::assert_with_log!(
            receive.creation_pred() == Some(StepId::new(5)),
            "receive follows its send",
            Some(StepId::new(5)),
            receive.creation_pred()
        );
        let after_choice = receive
            .preds()
            .iter()
            .any(|edge| edge.kind == EdgeKind::Program && edge.step == StepId::new(6));
        crate::assert_with_log!(after_choice, "program order through choice", true, after_choice);

        let send = &steps[5];
        let after_create = send.preds().iter().any(|edge| edge.step == StepId::new(3));
        crate::assert_with_log!(
            after_create,
            "first send ordered after create",
            true,
            after_create,
        );
        let dequeue_order = receive
            .preds()
            .iter()
            .any(|edge| edge.kind == EdgeKind::Inbox && edge.step == StepId::new(4));
        crate::assert_with_log!(dequeue_order, "receive after start", true, dequeue_order);
        crate::assert_with_log!(
            model.entity_type(e(2)) == Some("Server"),
            "entity type",
            Some("Server"),
            model.entity_type(e(2))
        );
        crate::test_complete!("edges_follow_creation_and_messages");
    }

    #[test]
    fn predecessors_are_always_older() {
        init_test("predecessors_are_always_older");
        let model = ping_pong_model();
        for step in model.ordered_steps() {
            for edge in step.preds() {
                crate::assert_with_log!(edge.step < step.id, "pred older", step.id, edge.step);
            }
        }
        crate::test_complete!("predecessors_are_always_older");
    }

    #[test]
    fn bug_step_prefers_hot_monitor_and_is_set_once() {
        init_test("bug_step_prefers_hot_monitor_and_is_set_once");
        let mut model = ping_pong_model();
        let hot = model
            .record(
                &ProgramEvent::MonitorStateChange {
                    source: e(2),
                    monitor: "Liveness".into(),
                    hot: true,
                },
                5,
            )
            .unwrap();
        model.record_integer_choice(e(1), 3, 6);
        model.set_bug_triggering_step();
        crate::assert_with_log!(
            model.bug_triggering_step() == Some(hot),
            "hot monitor blamed",
            Some(hot),
            model.bug_triggering_step()
        );
        model.reset();
        model.set_bug_triggering_step();
        crate::assert_with_log!(
            model.bug_triggering_step() == Some(StepId::ROOT),
            "fresh model blames last step",
            Some(StepId::ROOT),
            model.bug_triggering_step()
        );
        crate::test_complete!("bug_step_prefers_hot_monitor_and_is_set_once");
    }

    #[test]
    fn dropped_sends_are_tracked() {
        init_test("dropped_sends_are_tracked");
        let mut model = ProgramModel::new();
        let id = model
            .record(
                &ProgramEvent::Send {
                    sender: EntityId::HARNESS,
                    target: e(9),
                    event: EventDescriptor::named("Late"),
                    send_index: 1,
                    enqueued: false,
                },
                1,
            )
            .unwrap();
        crate::assert_with_log!(
            model.is_dropped_send(id),
            "dropped",
            true,
            model.is_dropped_send(id),
        );
        crate::test_complete!("dropped_sends_are_tracked");
    }

    #[test]
    fn json_and_binary_traces_rebuild_the_graph() {
        init_test("json_and_binary_traces_rebuild_the_graph");
        let mut model = ping_pong_model();
        model.set_bug_triggering_step();

        let text = model.serialize_trace().unwrap();
        let from_text = ProgramModel::from_trace_str(&text).unwrap();
        let bytes = model.to_bytes().unwrap();
        let from_bytes = ProgramModel::from_bytes(&bytes).unwrap();

        for rebuilt in [&from_text, &from_bytes] {
            crate::assert_with_log!(
                rebuilt.ordered_steps() == model.ordered_steps(),
                "steps identical",
                model.len(),
                rebuilt.len()
            );
            crate::assert_with_log!(
                rebuilt.bug_triggering_step() == model.bug_triggering_step(),
                "bug step kept",
                model.bug_triggering_step(),
                rebuilt.bug_triggering_step()
            );
            crate::assert_with_log!(
                !rebuilt.is_recording(),
                "loaded models are read-only",
                false,
                rebuilt.is_recording()
            );
        }
        crate::test_complete!("json_and_binary_traces_rebuild_the_graph");
    }

    #[test]
    fn step_ids_stop_at_the_index_limit() {
        init_test("step_ids_stop_at_the_index_limit");
        let last = step_id_at(u32::MAX as usize);
        crate::assert_with_log!(
            last == Some(StepId::new(u32::MAX)),
            "last index fits",
            Some(StepId::new(u32::MAX)),
            last
        );
        let past = usize::try_from(u64::from(u32::MAX) + 1).ok().and_then(step_id_at);
        crate::assert_with_log!(past.is_none(), "no wrap-around", None::<StepId>, past);
        crate::test_complete!("step_ids_stop_at_the_index_limit");
    }

    #[test]
    fn stopped_model_ignores_records() {
        init_test("stopped_model_ignores_records");
        let mut model = ProgramModel::new();
        model.stop_recording();
        let recorded = model.record(&ProgramEvent::Start { entity: e(1) }, 0);
        crate::assert_with_log!(recorded.is_none(), "ignored", None::<StepId>, recorded);
        crate::assert_with_log!(model.is_empty(), "only root", true, model.is_empty());
        crate::test_complete!("stopped_model_ignores_records");
    }
}
