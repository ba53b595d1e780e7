//! coopsched: a controlled cooperative scheduler for systematic concurrency testing.
//!
//! # Overview
//!
//! Actor programs whose correctness depends on the order in which actors run are
//! driven through a *controlled* interleaving: every actor runs on its own thread,
//! but only one of them executes user code at any instant. Whenever an actor is
//! about to do something ordering-relevant (create, send, receive, make a
//! nondeterministic choice) it yields to the [`Scheduler`], which asks a pluggable
//! [`SchedulingStrategy`] who runs next.
//!
//! Every run produces a [`ScheduleTrace`] (the flat decision list) and, when
//! recording is enabled, a [`ProgramModel`] (a DAG of program steps). Either can be
//! replayed to reproduce a bug exactly.
//!
//! # Core Guarantees
//!
//! - **Mutual exclusion**: at most one entity is active after every scheduling point
//! - **Strategy fidelity**: the sequence of active entities is exactly the strategy's
//! - **Explicit cancellation**: every blocking call returns [`ScheduleResult`]
//! - **Reproducibility**: replaying a recorded run reproduces its step list and bug
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers and operation kinds
//! - [`runtime`]: Entity records, the cooperative scheduler, configuration, reports
//! - [`strategy`]: Scheduling strategies (random, round-robin, DFS, recording, replay)
//! - [`model`]: Program model DAG and its serialized trace
//! - [`trace`]: Flat schedule traces
//! - [`lab`]: Controlled actor harness and iteration engines
//! - [`util`]: Deterministic RNG and hashing
//! - [`error`]: Error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod lab;
pub mod model;
pub mod runtime;
pub mod strategy;
pub mod trace;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(test)]
pub mod test_utils;

pub use error::{Cancelled, Error, ReplayError, Result, ScheduleResult};
pub use lab::{
    ActorContext, EngineSummary, Event, IterationOutcome, LabRuntime, ReplayEngine, ReplayOutcome,
    TestingEngine,
};
pub use model::{ProgramEvent, ProgramModel, ProgramStep, ProgramTrace, StepKind};
pub use runtime::{
    BugKind, BugReport, ReplayMismatchPolicy, Scheduler, SchedulerConfig, StrategyKind, Termination,
    TestReport,
};
pub use strategy::{
    DfsStrategy, GraphReplayStrategy, OperationView, ProgramModelStrategy, RandomStrategy,
    ReplayStrategy, RoundRobinStrategy, SchedulingStrategy,
};
pub use trace::{ScheduleStep, ScheduleTrace};
pub use types::{EntityId, OperationGroupId, OperationType, StepId, TargetKind};
