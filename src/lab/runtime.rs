//! Controlled actor harness.
//!
//! Actors are plain closures, each on its own worker thread. Every
//! ordering-relevant call on an [`ActorContext`] (creating an actor, sending,
//! receiving, asking for a nondeterministic value) goes through the
//! [`Scheduler`], so only one actor body ever runs at a time and the strategy
//! decides which.
//!
//! # Example
//!
//! ```ignore
//! use coopsched::lab::{Event, LabRuntime};
//! use coopsched::SchedulerConfig;
//!
//! let runtime = LabRuntime::new(SchedulerConfig::new(7));
//! let outcome = runtime.run(|ctx| {
//!     let echo = ctx.create_actor("Echo", |ctx| {
//!         let event = ctx.next_event()?;
//!         ctx.assert(event.type_name() == "Ping", "echo got a ping")
//!     })?;
//!     ctx.send(echo, Event::new("Ping"))
//! })?;
//! assert!(outcome.bug.is_none());
//! ```

use super::event::Event;
use crate::error::{Cancelled, Error, ScheduleResult};
use crate::model::{ProgramEvent, ProgramModel};
use crate::runtime::{BugKind, BugReport, Scheduler, SchedulerConfig, Termination, TestReport};
use crate::strategy::{ProgramModelStrategy, RoundRobinStrategy, SchedulingStrategy};
use crate::trace::ScheduleTrace;
use crate::tracing_compat::{debug, error, warn};
use crate::types::{EntityId, OperationGroupId, OperationType, TargetKind};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Type name of the actor the harness body runs as.
pub const MAIN_ACTOR: &str = "Main";

#[derive(Debug)]
struct Envelope {
    event: Event,
    send_index: u64,
    group: OperationGroupId,
}

#[derive(Debug, Default)]
struct Mailbox {
    queue: VecDeque<Envelope>,
    halted: bool,
}

/// State shared by every context of one run.
#[derive(Debug)]
struct World {
    scheduler: Scheduler,
    mailboxes: Mutex<BTreeMap<EntityId, Mailbox>>,
    next_entity: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl World {
    fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            mailboxes: Mutex::new(BTreeMap::new()),
            next_entity: AtomicU64::new(1),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Joins workers until none are left; workers may spawn more while we wait.
    fn join_workers(&self) {
        loop {
            let handles = std::mem::take(&mut *self.workers.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if handle.join().is_err() {
                    warn!("worker thread panicked outside its actor body");
                }
            }
        }
    }
}

/// An actor's handle to the run.
///
/// Cheap to clone. Every method that returns [`ScheduleResult`] may yield to
/// other actors; [`Cancelled`] means the run is over and the actor should
/// unwind, typically with `?`.
#[derive(Debug, Clone)]
pub struct ActorContext {
    world: Arc<World>,
    id: EntityId,
}

impl ActorContext {
    /// This actor's id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The scheduler of the run.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.world.scheduler
    }

    /// Whether the run is still going.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.world.scheduler.is_running()
    }

    /// Creates an actor of `type_name` running `body` on its own worker.
    ///
    /// Returns once the new worker is parked and waiting to be chosen.
    pub fn create_actor<F>(&self, type_name: &str, body: F) -> ScheduleResult<EntityId>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let scheduler = &self.world.scheduler;
        scheduler.schedule(
            OperationType::Create,
            TargetKind::Schedulable,
            EntityId::UNASSIGNED,
        )?;
        let id = EntityId::new(self.world.next_entity.fetch_add(1, Ordering::SeqCst));
        self.world.mailboxes.lock().insert(id, Mailbox::default());
        scheduler.record(&ProgramEvent::Create {
            creator: self.id,
            created: id,
            type_name: type_name.to_owned(),
        });
        scheduler.notify_event_handler_created(id, type_name, None, 0);

        let child = Self {
            world: Arc::clone(&self.world),
            id,
        };
        let spawned = thread::Builder::new()
            .name(format!("coopsched-{id}"))
            .spawn(move || child.run_worker(body));
        match spawned {
            Ok(handle) => self.world.workers.lock().push(handle),
            Err(err) => {
                error!(entity = %id, error = %err, "failed to spawn worker");
                let message = format!("Failed to spawn the worker of {type_name}({id}): {err}");
                return Err(scheduler.notify_bug(BugKind::Panic, &message));
            }
        }
        debug!(creator = %self.id, created = %id, type_name, "actor created");
        scheduler.wait_for_event_handler_to_start(id)?;
        Ok(id)
    }

    fn run_worker<F>(self, body: F)
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()>,
    {
        let scheduler = self.world.scheduler.clone();
        if scheduler.notify_event_handler_started(self.id).is_ok() {
            scheduler.record(&ProgramEvent::Start { entity: self.id });
            let result = match panic::catch_unwind(AssertUnwindSafe(|| body(&self))) {
                Ok(result) => result,
                Err(payload) => {
                    let message =
                        format!("Actor {} panicked: {}", self.id, panic_message(payload.as_ref()));
                    error!(entity = %self.id, %message, "actor panicked");
                    Err(scheduler.notify_bug(BugKind::Panic, &message))
                }
            };
            match result {
                Ok(()) => {
                    debug!(entity = %self.id, "actor finished");
                }
                Err(Cancelled) => {
                    debug!(entity = %self.id, "actor cancelled");
                }
            }
        }
        if self.halt().is_err() {
            debug!(entity = %self.id, "run ended at halt");
        }
    }

    /// Drops the mailbox contents; later sends to this actor are dropped.
    fn halt(&self) -> ScheduleResult<()> {
        {
            let mut boxes = self.world.mailboxes.lock();
            if let Some(mailbox) = boxes.get_mut(&self.id) {
                mailbox.halted = true;
                mailbox.queue.clear();
            }
        }
        self.world.scheduler.notify_entity_halted(self.id)
    }

    /// Sends `event` to `target`.
    ///
    /// An event sent to an actor that has already halted is dropped; the send
    /// is still recorded.
    pub fn send(&self, target: EntityId, event: Event) -> ScheduleResult<()> {
        let scheduler = &self.world.scheduler;
        scheduler.schedule(OperationType::Send, TargetKind::Inbox, target)?;
        let send_index = scheduler.next_send_index();
        let group = self.operation_group();
        let descriptor = event.descriptor();
        let enqueued = {
            let mut boxes = self.world.mailboxes.lock();
            match boxes.get_mut(&target) {
                Some(mailbox) if !mailbox.halted => {
                    mailbox.queue.push_back(Envelope {
                        event,
                        send_index,
                        group,
                    });
                    true
                }
                _ => false,
            }
        };
        scheduler.record(&ProgramEvent::Send {
            sender: self.id,
            target,
            event: descriptor,
            send_index,
            enqueued,
        });
        if enqueued {
            scheduler.notify_event_enqueued(target, send_index);
        } else {
            debug!(sender = %self.id, target = %target, send_index, "event dropped");
        }
        Ok(())
    }

    /// Receives the next event, blocking while the inbox is empty.
    pub fn receive(&self) -> ScheduleResult<Event> {
        let scheduler = &self.world.scheduler;
        loop {
            match self.head_send_index() {
                Some(send_index) => scheduler.schedule_receive(send_index)?,
                None => scheduler.notify_waiting_to_receive(self.id)?,
            }
            if let Some(event) = self.dequeue() {
                return Ok(event);
            }
        }
    }

    /// Handler-style receive: when the inbox is empty the handler completes,
    /// and the next send to this actor starts it again.
    pub fn next_event(&self) -> ScheduleResult<Event> {
        let scheduler = &self.world.scheduler;
        loop {
            match self.head_send_index() {
                Some(send_index) => {
                    scheduler.schedule_receive(send_index)?;
                    if let Some(event) = self.dequeue() {
                        return Ok(event);
                    }
                }
                None => scheduler.notify_event_handler_completed(self.id)?,
            }
        }
    }

    fn head_send_index(&self) -> Option<u64> {
        self.world
            .mailboxes
            .lock()
            .get(&self.id)
            .and_then(|mailbox| mailbox.queue.front())
            .map(|envelope| envelope.send_index)
    }

    fn dequeue(&self) -> Option<Event> {
        let envelope = self
            .world
            .mailboxes
            .lock()
            .get_mut(&self.id)
            .and_then(|mailbox| mailbox.queue.pop_front())?;
        let scheduler = &self.world.scheduler;
        scheduler.set_operation_group(self.id, envelope.group);
        scheduler.record(&ProgramEvent::Receive {
            receiver: self.id,
            event: envelope.event.descriptor(),
            send_index: envelope.send_index,
        });
        Some(envelope.event)
    }

    /// Nondeterministic boolean.
    pub fn random_bool(&self) -> ScheduleResult<bool> {
        self.world.scheduler.next_boolean_choice(2, None)
    }

    /// Nondeterministic boolean tagged with `unique_id` in the schedule trace.
    pub fn fair_random_bool(&self, unique_id: &str) -> ScheduleResult<bool> {
        self.world.scheduler.next_boolean_choice(2, Some(unique_id))
    }

    /// Nondeterministic integer in `[0, max_value)`; always 0 when `max_value` is 0.
    pub fn random_int(&self, max_value: u32) -> ScheduleResult<u32> {
        self.world.scheduler.next_integer_choice(max_value)
    }

    /// Fails the run with `message` unless `condition` holds.
    pub fn assert(&self, condition: bool, message: &str) -> ScheduleResult<()> {
        if condition {
            Ok(())
        } else {
            self.world.scheduler.notify_assertion_failure(message, true)
        }
    }

    /// Records a failed assertion but keeps the run going.
    pub fn soft_assert(&self, condition: bool, message: &str) -> ScheduleResult<()> {
        if condition {
            Ok(())
        } else {
            self.world.scheduler.notify_assertion_failure(message, false)
        }
    }

    /// Announces `event` to the monitor named `monitor`.
    pub fn monitor_event(&self, monitor: &str, event: &Event) {
        self.world.scheduler.record(&ProgramEvent::MonitorEvent {
            source: self.id,
            monitor: monitor.to_owned(),
            event: event.descriptor(),
        });
    }

    /// Reports that `monitor` moved into a hot (`true`) or cold state.
    pub fn monitor_state(&self, monitor: &str, hot: bool) {
        self.world.scheduler.record(&ProgramEvent::MonitorStateChange {
            source: self.id,
            monitor: monitor.to_owned(),
            hot,
        });
    }

    /// This actor's operation group, allocating one on first use.
    #[must_use]
    pub fn operation_group(&self) -> OperationGroupId {
        let scheduler = &self.world.scheduler;
        let group = scheduler.operation_group(self.id);
        if group != OperationGroupId::default() {
            return group;
        }
        let fresh = scheduler.fresh_operation_group();
        scheduler.set_operation_group(self.id, fresh);
        fresh
    }

    /// Entities currently marked active.
    #[must_use]
    pub fn active_entities(&self) -> Vec<EntityId> {
        self.world.scheduler.active_entities()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    /// Zero-based iteration number within an engine run.
    pub iteration: u64,
    /// The bug found, if any.
    pub bug: Option<BugReport>,
    /// How the run ended.
    pub termination: Termination,
    /// Decisions made.
    pub steps: u64,
    /// Whether the strategy was fair.
    pub fair: bool,
    /// Every decision, in order.
    pub schedule_trace: ScheduleTrace,
    /// Program model, when the strategy records one.
    pub program_model: Option<ProgramModel>,
    /// Statistics for the run.
    pub report: TestReport,
}

impl IterationOutcome {
    fn capture(scheduler: &Scheduler) -> Self {
        Self {
            iteration: 0,
            bug: scheduler.bug_report(),
            termination: scheduler.termination(),
            steps: scheduler.scheduled_steps(),
            fair: scheduler.is_fair(),
            schedule_trace: scheduler.schedule_trace(),
            program_model: scheduler.program_model(),
            report: scheduler.report(),
        }
    }

    /// Whether the run found a bug.
    #[must_use]
    pub const fn found_bug(&self) -> bool {
        self.bug.is_some()
    }

    /// Scheduling points whose state had already been seen in the run.
    #[must_use]
    pub const fn revisited_states(&self) -> u64 {
        self.report.revisited_states
    }
}

/// Runs a harness body as the `Main` actor under a fresh scheduler.
#[derive(Debug, Clone)]
pub struct LabRuntime {
    config: SchedulerConfig,
}

impl LabRuntime {
    /// Runtime with `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs `main` once with the configured strategy.
    pub fn run<F>(&self, main: F) -> crate::Result<IterationOutcome>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let strategy = self.config.build_strategy();
        let strategy: Box<dyn SchedulingStrategy> = if self.config.record_program_model {
            Box::new(ProgramModelStrategy::new(strategy))
        } else {
            strategy
        };
        self.run_with(strategy, main).map(|(outcome, _)| outcome)
    }

    /// Runs `main` once under `strategy` and hands the strategy back.
    ///
    /// The calling thread acts as the harness: it creates the `Main` actor,
    /// waits for the run to stop and joins every worker.
    pub fn run_with<F>(
        &self,
        strategy: Box<dyn SchedulingStrategy>,
        main: F,
    ) -> crate::Result<(IterationOutcome, Box<dyn SchedulingStrategy>)>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let world = Arc::new(World::new(Scheduler::new(self.config.clone(), strategy)));
        let harness = ActorContext {
            world: Arc::clone(&world),
            id: EntityId::HARNESS,
        };
        if harness.create_actor(MAIN_ACTOR, main).is_err() {
            debug!("run stopped before the main actor started");
        }
        drop(harness);
        world.scheduler.wait();
        world.join_workers();

        let outcome = IterationOutcome::capture(&world.scheduler);
        debug!(
            steps = outcome.steps,
            termination = ?outcome.termination,
            bug = outcome.bug.is_some(),
            "run finished"
        );
        let escaped = Arc::strong_count(&world) > 1 || world.scheduler.handle_count() > 1;
        let strategy = if escaped {
            // The run has stopped, so the strategy is never consulted again.
            warn!(
                handles = Arc::strong_count(&world),
                "an actor context outlived its run; detaching the strategy"
            );
            world
                .scheduler
                .switch_strategy(Box::new(RoundRobinStrategy::new(0)))
        } else {
            let world = Arc::try_unwrap(world).map_err(|world| Error::SchedulerInUse {
                handles: Arc::strong_count(&world),
            })?;
            world.scheduler.shutdown()?
        };
        Ok((outcome, strategy))
    }
}
