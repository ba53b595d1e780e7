//! Controlled cooperative scheduler.
//!
//! Every actor runs on its own worker thread, but only the *active* entity's
//! worker executes user code. Before anything ordering-relevant the worker
//! calls into the scheduler, which consults the strategy, activates the chosen
//! entity and parks the caller until it is chosen again.
//!
//! # Locking
//!
//! One mutex guards the global state (strategy, live set, trace, bug). Each
//! entity has its own mutex and condition variable; a parked worker waits on
//! its entity's pair only. Locks are always taken global state first, then
//! entity, never the other way round.
//!
//! # Handshake
//!
//! ```text
//! worker A                  scheduler (under state lock)          worker B
//! schedule(op) ───────────► strategy picks B
//!                           A.active = false
//!                           B.active = true, notify B ──────────► wakes, returns Ok
//! park until A.active ◄──── (later, someone picks A)
//! ```
//!
//! [`Scheduler::stop`] force-activates and disables every entity, so every
//! parked worker wakes up and unwinds with [`Cancelled`].

use super::config::SchedulerConfig;
use super::entity::SchedulableEntity;
use super::report::{BugKind, BugReport, Termination, TestReport};
use super::state_cache::StateCache;
use crate::error::{Cancelled, Error, ScheduleResult};
use crate::model::{ProgramEvent, ProgramModel};
use crate::strategy::{OperationView, SchedulingStrategy};
use crate::trace::ScheduleTrace;
use crate::tracing_compat::{debug, error, trace};
use crate::types::{EntityId, OperationGroupId, OperationType, TargetKind};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// An entity record with the condition variable its worker parks on.
#[derive(Debug)]
struct EntitySlot {
    record: Mutex<SchedulableEntity>,
    wake: Condvar,
}

impl EntitySlot {
    fn new(record: SchedulableEntity) -> Arc<Self> {
        Arc::new(Self {
            record: Mutex::new(record),
            wake: Condvar::new(),
        })
    }

    fn activate(&self) {
        let mut record = self.record.lock();
        record.is_active = true;
        self.wake.notify_all();
    }

    fn deactivate(&self) {
        self.record.lock().is_active = false;
    }

    /// Blocks the calling worker until the entity is activated.
    fn park(&self) -> ScheduleResult<()> {
        let mut record = self.record.lock();
        while !record.is_active {
            self.wake.wait(&mut record);
        }
        if record.is_enabled {
            Ok(())
        } else {
            Err(Cancelled)
        }
    }

    fn view(&self) -> OperationView {
        let record = self.record.lock();
        OperationView {
            id: record.id,
            name: Arc::clone(&record.name),
            is_enabled: record.is_enabled,
            is_waiting_to_receive: record.is_waiting_to_receive,
            next_operation: record.next_operation,
            target_kind: record.next_target_kind,
            target_id: record.next_target_id,
            matching_send_index: record.matching_send_index,
            operation_group: record.operation_group,
        }
    }
}

struct SchedulerState {
    strategy: Box<dyn SchedulingStrategy>,
    entities: BTreeMap<EntityId, Arc<EntitySlot>>,
    scheduled: Option<EntityId>,
    running: bool,
    fully_explored: bool,
    bound_reached: bool,
    bug: Option<BugReport>,
    trace: ScheduleTrace,
    cache: Option<StateCache>,
    next_send_index: u64,
    next_operation_group: u64,
}

impl SchedulerState {
    /// Views of every live entity, sorted by id.
    fn views(&self) -> Vec<OperationView> {
        self.entities.values().map(|slot| slot.view()).collect()
    }

    fn slot(&self, id: EntityId) -> Option<Arc<EntitySlot>> {
        self.entities.get(&id).cloned()
    }
}

/// One-shot completion signal resolved when the scheduler stops.
#[derive(Debug, Default)]
struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    fn resolve(&self) {
        let mut done = self.done.lock();
        if !*done {
            *done = true;
            self.signal.notify_all();
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.signal.wait(&mut done);
        }
    }
}

struct Shared {
    config: SchedulerConfig,
    control_thread: ThreadId,
    state: Mutex<SchedulerState>,
    started: Condvar,
    completion: Completion,
}

/// Handle to the cooperative scheduler of one iteration.
///
/// Cheap to clone; every worker holds a clone. The thread that calls
/// [`Scheduler::new`] is the harness's control thread: its scheduling points
/// return immediately.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Scheduler");
        if let Some(state) = self.shared.state.try_lock() {
            debug
                .field("strategy", &state.strategy.description())
                .field("running", &state.running)
                .field("scheduled", &state.scheduled)
                .field("entities", &state.entities.len())
                .field("steps", &state.strategy.scheduled_steps());
        }
        debug.finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler driven by `strategy`, owned by the calling thread.
    #[must_use]
    pub fn new(config: SchedulerConfig, strategy: Box<dyn SchedulingStrategy>) -> Self {
        debug!(strategy = %strategy.description(), "scheduler created");
        let cache = config.cache_program_state.then(StateCache::new);
        Self {
            shared: Arc::new(Shared {
                config,
                control_thread: thread::current().id(),
                state: Mutex::new(SchedulerState {
                    strategy,
                    entities: BTreeMap::new(),
                    scheduled: None,
                    running: true,
                    fully_explored: false,
                    bound_reached: false,
                    bug: None,
                    trace: ScheduleTrace::new(),
                    cache,
                    next_send_index: 1,
                    next_operation_group: 1,
                }),
                started: Condvar::new(),
                completion: Completion::default(),
            }),
        }
    }

    /// Configuration of the run.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Whether the calling thread is the harness's control thread.
    #[must_use]
    pub fn is_control_thread(&self) -> bool {
        thread::current().id() == self.shared.control_thread
    }

    /// Whether the run is still going.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Scheduling point before `operation`.
    ///
    /// Parks the caller until the strategy chooses it again. Returns
    /// [`Cancelled`] once the run has stopped.
    pub fn schedule(
        &self,
        operation: OperationType,
        target_kind: TargetKind,
        target_id: EntityId,
    ) -> ScheduleResult<()> {
        self.schedule_inner(operation, target_kind, target_id, None)
    }

    /// Scheduling point before dequeuing the event sent with `matching_send_index`.
    pub fn schedule_receive(&self, matching_send_index: u64) -> ScheduleResult<()> {
        self.schedule_inner(
            OperationType::Receive,
            TargetKind::Inbox,
            EntityId::UNASSIGNED,
            Some(matching_send_index),
        )
    }

    fn schedule_inner(
        &self,
        operation: OperationType,
        target_kind: TargetKind,
        target_id: EntityId,
        matching_send_index: Option<u64>,
    ) -> ScheduleResult<()> {
        if self.is_control_thread() {
            return Ok(());
        }
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        let target_id = if target_id == EntityId::UNASSIGNED && target_kind == TargetKind::Inbox {
            current
        } else {
            target_id
        };
        if operation == OperationType::Receive {
            let mut record = slot.record.lock();
            if record.skip_next_receive_point {
                record.skip_next_receive_point = false;
                trace!(entity = %current, "receive point already accounted for");
                return Ok(());
            }
            if let Some(index) = matching_send_index {
                record.matching_send_index = index;
            }
        }
        self.schedule_point(state, current, &slot, operation, target_kind, target_id)
    }

    /// Bound check, pending operation, decision and handshake.
    fn schedule_point(
        &self,
        mut state: MutexGuard<'_, SchedulerState>,
        current: EntityId,
        slot: &Arc<EntitySlot>,
        operation: OperationType,
        target_kind: TargetKind,
        target_id: EntityId,
    ) -> ScheduleResult<()> {
        self.check_bound(&mut state)?;
        slot.record
            .lock()
            .set_next_operation(operation, target_kind, target_id);
        self.hand_off(state, current, Some(slot))
    }

    /// Asks the strategy for the next entity and switches to it.
    ///
    /// `parked` is the caller's slot; it is parked until chosen again. A
    /// halting entity passes `None` and returns right after the switch.
    fn hand_off(
        &self,
        mut state: MutexGuard<'_, SchedulerState>,
        current: EntityId,
        parked: Option<&Arc<EntitySlot>>,
    ) -> ScheduleResult<()> {
        let ops = state.views();
        if let Some(cache) = state.cache.as_mut() {
            if cache.capture(&ops) {
                trace!(entity = %current, "revisited program state");
            }
        }
        let Some(next) = state.strategy.next_operation(&ops, current) else {
            return Err(self.end_of_schedule(&mut state));
        };
        let Some(next_slot) = state.slot(next) else {
            error!(entity = %next, "strategy chose an entity that is not live");
            return Err(self.stop_locked(&mut state));
        };
        state.trace.push_scheduling_choice(next);
        trace!(
            from = %current,
            to = %next,
            step = state.strategy.scheduled_steps(),
            "scheduling decision"
        );
        if next == current {
            return Ok(());
        }
        if let Some(slot) = state.slot(current) {
            slot.deactivate();
        }
        next_slot.activate();
        state.scheduled = Some(next);
        drop(state);
        match parked {
            Some(slot) => slot.park(),
            None => Ok(()),
        }
    }

    /// Verifies that the caller is the worker bound to the active entity.
    fn check_controlled(
        &self,
        state: &mut SchedulerState,
    ) -> ScheduleResult<(EntityId, Arc<EntitySlot>)> {
        let caller = thread::current().id();
        if let Some(current) = state.scheduled {
            if let Some(slot) = state.slot(current) {
                if slot.record.lock().task == Some(caller) {
                    return Ok((current, slot));
                }
            }
        }
        let message =
            format!("Detected thread {caller:?} that is not controlled by the scheduler.");
        self.report_bug(state, BugKind::UncontrolledConcurrency, message);
        Err(self.stop_locked(state))
    }

    fn check_bound(&self, state: &mut SchedulerState) -> ScheduleResult<()> {
        if !state.strategy.has_reached_max_scheduling_steps() {
            return Ok(());
        }
        let bound = self.shared.config.step_bound(state.strategy.is_fair());
        state.bound_reached = true;
        if self.shared.config.depth_bound_is_bug {
            let message = format!("Scheduling steps bound of {bound} reached.");
            self.report_bug(state, BugKind::StepBound, message);
        } else {
            debug!(bound, "step bound reached");
        }
        Err(self.stop_locked(state))
    }

    /// The strategy produced no decision.
    fn end_of_schedule(&self, state: &mut SchedulerState) -> Cancelled {
        if !self.report_replay_failure(state) {
            let waiting: Vec<Arc<str>> = state
                .entities
                .values()
                .filter_map(|slot| {
                    let record = slot.record.lock();
                    (record.is_waiting_to_receive && !record.is_completed)
                        .then(|| Arc::clone(&record.name))
                })
                .collect();
            if let Some(message) = livelock_message(&waiting) {
                self.report_bug(state, BugKind::Livelock, message);
            }
        }
        state.fully_explored = true;
        self.stop_locked(state)
    }

    fn report_replay_failure(&self, state: &mut SchedulerState) -> bool {
        let Some(failure) = state.strategy.replay_error().cloned() else {
            return false;
        };
        self.report_bug(state, BugKind::ReplayDivergence, failure.to_string());
        true
    }

    fn report_bug(&self, state: &mut SchedulerState, kind: BugKind, message: String) {
        if state.bug.is_some() {
            debug!(%kind, %message, "later bug suppressed");
            return;
        }
        let report = BugReport {
            kind,
            message,
            strategy: state.strategy.description(),
            steps: state.strategy.scheduled_steps(),
            entity: state.scheduled,
        };
        error!(%kind, message = %report.message, steps = report.steps, "bug found");
        state.bug = Some(report);
    }

    fn stop_locked(&self, state: &mut SchedulerState) -> Cancelled {
        if state.running {
            state.running = false;
            let bug_found = state.bug.is_some();
            debug!(
                steps = state.strategy.scheduled_steps(),
                bug_found,
                "scheduler stopping"
            );
            state.strategy.notify_scheduling_ended(bug_found);
            for slot in state.entities.values() {
                let mut record = slot.record.lock();
                record.is_active = true;
                record.is_enabled = false;
                slot.wake.notify_all();
            }
            self.shared.started.notify_all();
            self.shared.completion.resolve();
        }
        Cancelled
    }

    /// Nondeterministic boolean for the active entity.
    ///
    /// `unique_id` tags a fair choice in the schedule trace.
    pub fn next_boolean_choice(
        &self,
        max_value: u32,
        unique_id: Option<&str>,
    ) -> ScheduleResult<bool> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        self.check_bound(&mut state)?;
        let Some(value) = state.strategy.next_boolean_choice(current, max_value) else {
            self.report_replay_failure(&mut state);
            return Err(self.stop_locked(&mut state));
        };
        state
            .trace
            .push_boolean_choice(value, unique_id.map(str::to_owned));
        slot.record.lock().program_counter += 1;
        trace!(entity = %current, value, "boolean choice");
        Ok(value)
    }

    /// Nondeterministic integer in `[0, max_value)` for the active entity.
    pub fn next_integer_choice(&self, max_value: u32) -> ScheduleResult<u32> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        self.check_bound(&mut state)?;
        let Some(value) = state.strategy.next_integer_choice(current, max_value) else {
            self.report_replay_failure(&mut state);
            return Err(self.stop_locked(&mut state));
        };
        state.trace.push_integer_choice(value);
        slot.record.lock().program_counter += 1;
        trace!(entity = %current, value, "integer choice");
        Ok(value)
    }

    /// Registers a new entity, or re-enables an idle one.
    ///
    /// `task` binds the worker; a fresh entity may pass `None` and bind in
    /// [`notify_event_handler_started`](Self::notify_event_handler_started).
    pub fn notify_event_handler_created(
        &self,
        entity: EntityId,
        name: &str,
        task: Option<ThreadId>,
        matching_send_index: u64,
    ) {
        let mut state = self.shared.state.lock();
        let running = state.running;
        let slot = state
            .entities
            .entry(entity)
            .or_insert_with(|| EntitySlot::new(SchedulableEntity::new(entity, name)));
        let mut record = slot.record.lock();
        record.notify_event_handler_created(task, matching_send_index);
        if !running {
            // Registered after stop: the worker must not park.
            record.is_active = true;
            record.is_enabled = false;
        }
        trace!(entity = %entity, name, matching_send_index, "handler created");
    }

    /// Blocks until `entity`'s worker reported in.
    ///
    /// When no entity is active yet (the harness just created the first
    /// actor), the entity is activated right away.
    pub fn wait_for_event_handler_to_start(&self, entity: EntityId) -> ScheduleResult<()> {
        let mut state = self.shared.state.lock();
        loop {
            if !state.running {
                return Err(Cancelled);
            }
            let started = state
                .entities
                .get(&entity)
                .map_or(true, |slot| slot.record.lock().has_started);
            if started {
                break;
            }
            self.shared.started.wait(&mut state);
        }
        if state.scheduled.is_none() {
            if let Some(slot) = state.slot(entity) {
                debug!(entity = %entity, "activating first entity");
                state.scheduled = Some(entity);
                slot.activate();
            }
        }
        Ok(())
    }

    /// Called by `entity`'s worker when it begins; binds the worker and parks
    /// it until the entity is first chosen.
    pub fn notify_event_handler_started(&self, entity: EntityId) -> ScheduleResult<()> {
        let slot = {
            let state = self.shared.state.lock();
            let Some(slot) = state.slot(entity) else {
                return Err(Cancelled);
            };
            {
                let mut record = slot.record.lock();
                record.task = Some(thread::current().id());
                record.has_started = true;
            }
            self.shared.started.notify_all();
            slot
        };
        slot.park()
    }

    /// The active handler ran out of events; yields until a send re-creates it.
    pub fn notify_event_handler_completed(&self, entity: EntityId) -> ScheduleResult<()> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        debug_assert_eq!(entity, current, "only the active handler can complete");
        slot.record.lock().notify_event_handler_completed();
        trace!(entity = %current, "handler completed");
        self.schedule_point(
            state,
            current,
            &slot,
            OperationType::Receive,
            TargetKind::Inbox,
            current,
        )
    }

    /// The active entity blocks in an explicit receive with an empty inbox.
    pub fn notify_waiting_to_receive(&self, entity: EntityId) -> ScheduleResult<()> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        debug_assert_eq!(entity, current, "only the active entity can wait to receive");
        slot.record.lock().notify_waiting_to_receive();
        trace!(entity = %current, "waiting to receive");
        self.schedule_point(
            state,
            current,
            &slot,
            OperationType::Receive,
            TargetKind::Inbox,
            current,
        )
    }

    /// An event sent with `send_index` was enqueued for `target`.
    ///
    /// Wakes a waiting receiver or re-creates an idle handler.
    pub fn notify_event_enqueued(&self, target: EntityId, send_index: u64) {
        let state = self.shared.state.lock();
        let Some(slot) = state.entities.get(&target) else {
            return;
        };
        let mut record = slot.record.lock();
        if record.is_waiting_to_receive {
            record.notify_event_received(send_index);
        } else if record.is_idle() {
            record.notify_event_handler_created(None, send_index);
        }
    }

    /// The active entity halted: a final `Stop` point, then control moves on.
    ///
    /// Never parks the caller. [`Cancelled`] means the run ended at this point.
    pub fn notify_entity_halted(&self, entity: EntityId) -> ScheduleResult<()> {
        let mut state = self.shared.state.lock();
        if !state.running {
            state.entities.remove(&entity);
            return Err(Cancelled);
        }
        let (current, slot) = self.check_controlled(&mut state)?;
        debug_assert_eq!(entity, current, "only the active entity can halt");
        {
            let mut record = slot.record.lock();
            record.set_next_operation(OperationType::Stop, TargetKind::Schedulable, current);
            record.is_completed = true;
            record.is_enabled = false;
            record.is_active = false;
        }
        state.entities.remove(&current);
        debug!(entity = %current, "entity halted");
        self.check_bound(&mut state)?;
        self.hand_off(state, current, None)
    }

    /// Records an assertion failure. Only the first bug of a run is kept.
    ///
    /// With `stop` the run ends and [`Cancelled`] is returned.
    pub fn notify_assertion_failure(&self, message: &str, stop: bool) -> ScheduleResult<()> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Cancelled);
        }
        self.report_bug(&mut state, BugKind::Assertion, message.to_owned());
        if stop {
            Err(self.stop_locked(&mut state))
        } else {
            Ok(())
        }
    }

    /// Records a bug of any kind and stops the run.
    pub fn notify_bug(&self, kind: BugKind, message: &str) -> Cancelled {
        let mut state = self.shared.state.lock();
        if state.running {
            self.report_bug(&mut state, kind, message.to_owned());
        }
        self.stop_locked(&mut state)
    }

    /// Forwards a runtime occurrence to the strategy.
    pub fn record(&self, event: &ProgramEvent) {
        let mut state = self.shared.state.lock();
        if state.running {
            trace!(?event, steps = state.strategy.scheduled_steps(), "program event");
            state.strategy.observe(event);
        }
    }

    /// Allocates the index of a new send. Indices start at 1.
    pub fn next_send_index(&self) -> u64 {
        let mut state = self.shared.state.lock();
        let index = state.next_send_index;
        state.next_send_index += 1;
        index
    }

    /// Allocates a fresh operation group.
    pub fn fresh_operation_group(&self) -> OperationGroupId {
        let mut state = self.shared.state.lock();
        let group = OperationGroupId::new(state.next_operation_group);
        state.next_operation_group += 1;
        group
    }

    /// Operation group of `entity`.
    #[must_use]
    pub fn operation_group(&self, entity: EntityId) -> OperationGroupId {
        self.shared
            .state
            .lock()
            .entities
            .get(&entity)
            .map(|slot| slot.record.lock().operation_group)
            .unwrap_or_default()
    }

    /// Sets the operation group of `entity`.
    pub fn set_operation_group(&self, entity: EntityId, group: OperationGroupId) {
        let state = self.shared.state.lock();
        if let Some(slot) = state.entities.get(&entity) {
            slot.record.lock().operation_group = group;
        }
    }

    /// Stops the run: every entity is woken and disabled, and [`wait`] returns.
    ///
    /// [`wait`]: Self::wait
    pub fn stop(&self) -> Cancelled {
        let mut state = self.shared.state.lock();
        self.stop_locked(&mut state)
    }

    /// Blocks until the run has stopped.
    pub fn wait(&self) {
        self.shared.completion.wait();
    }

    /// Entities currently marked active.
    #[must_use]
    pub fn active_entities(&self) -> Vec<EntityId> {
        let state = self.shared.state.lock();
        state
            .entities
            .iter()
            .filter(|(_, slot)| slot.record.lock().is_active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// The entity that was chosen last.
    #[must_use]
    pub fn current_entity(&self) -> Option<EntityId> {
        self.shared.state.lock().scheduled
    }

    /// Decisions made so far.
    #[must_use]
    pub fn scheduled_steps(&self) -> u64 {
        self.shared.state.lock().strategy.scheduled_steps()
    }

    /// Whether the strategy's fairness contract applies to this run.
    #[must_use]
    pub fn is_fair(&self) -> bool {
        self.shared.state.lock().strategy.is_fair()
    }

    /// Whether the run ended because nothing was left to decide.
    #[must_use]
    pub fn is_fully_explored(&self) -> bool {
        self.shared.state.lock().fully_explored
    }

    /// The bug found in this run, if any.
    #[must_use]
    pub fn bug_report(&self) -> Option<BugReport> {
        self.shared.state.lock().bug.clone()
    }

    /// How the run ended (or would end, if it stopped now).
    #[must_use]
    pub fn termination(&self) -> Termination {
        let state = self.shared.state.lock();
        if state.bug.is_some() {
            Termination::BugFound
        } else if state.bound_reached {
            Termination::StepBoundReached
        } else {
            Termination::Quiescent
        }
    }

    /// Every decision of the run so far.
    #[must_use]
    pub fn schedule_trace(&self) -> ScheduleTrace {
        self.shared.state.lock().trace.clone()
    }

    /// Program model recorded by the strategy, if it records one.
    #[must_use]
    pub fn program_model(&self) -> Option<ProgramModel> {
        self.shared.state.lock().strategy.program_model().cloned()
    }

    /// Statistics for this run.
    #[must_use]
    pub fn report(&self) -> TestReport {
        let state = self.shared.state.lock();
        let config = &self.shared.config;
        let steps = state.strategy.scheduled_steps();
        let mut report = TestReport::new();
        if let Some(bug) = &state.bug {
            report.record_bug(bug.clone());
        }
        if state.strategy.is_fair() {
            report.explored_fair_schedules = 1;
            report.total_explored_fair_steps = steps;
            report.min_explored_fair_steps = Some(steps);
            report.max_explored_fair_steps = steps;
            if steps >= config.max_fair_steps {
                report.max_fair_steps_hit_in_fair_tests = 1;
            }
            if steps >= config.max_unfair_steps {
                report.max_unfair_steps_hit_in_fair_tests = 1;
            }
        } else {
            report.explored_unfair_schedules = 1;
            if steps >= config.max_unfair_steps {
                report.max_unfair_steps_hit_in_unfair_tests = 1;
            }
        }
        report.revisited_states = state
            .cache
            .as_ref()
            .map_or(0, StateCache::revisited_states);
        report
    }

    /// Replaces the strategy, returning the previous one.
    pub fn switch_strategy(
        &self,
        strategy: Box<dyn SchedulingStrategy>,
    ) -> Box<dyn SchedulingStrategy> {
        let mut state = self.shared.state.lock();
        debug!(
            from = %state.strategy.description(),
            to = %strategy.description(),
            "switching strategy"
        );
        std::mem::replace(&mut state.strategy, strategy)
    }

    /// Live handles to this scheduler, including `self`.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Ends the scheduler's life and hands back its strategy.
    ///
    /// Fails while other handles are alive; join every worker first.
    pub fn shutdown(self) -> crate::Result<Box<dyn SchedulingStrategy>> {
        match Arc::try_unwrap(self.shared) {
            Ok(shared) => Ok(shared.state.into_inner().strategy),
            Err(shared) => Err(Error::SchedulerInUse {
                handles: Arc::strong_count(&shared),
            }),
        }
    }
}

/// Livelock description for the entities stuck in a receive, if any.
fn livelock_message(waiting: &[Arc<str>]) -> Option<String> {
    let (last, rest) = waiting.split_last()?;
    let names = if rest.is_empty() {
        format!("'{last}' is")
    } else {
        let head: Vec<String> = rest.iter().map(|name| format!("'{name}'")).collect();
        format!("{} and '{last}' are", head.join(", "))
    };
    Some(format!(
        "Livelock detected. {names} waiting for an event, but no other schedulable choices are enabled."
    ))
}
