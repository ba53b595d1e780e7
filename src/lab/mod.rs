//! Controlled actor harness and iteration engines.
//!
//! The lab runs actor programs under the cooperative [`Scheduler`]:
//!
//! - [`ActorContext`]: an actor's handle for creating, sending, receiving and
//!   asking for nondeterministic values
//! - [`LabRuntime`]: one controlled run of a harness body
//! - [`TestingEngine`]: many runs under one exploration strategy
//! - [`ReplayEngine`]: reproduction of a recorded run
//!
//! [`Scheduler`]: crate::runtime::Scheduler

pub mod engine;
pub mod event;
pub mod runtime;

pub use engine::{EngineSummary, ReplayEngine, ReplayOutcome, TestingEngine};
pub use event::Event;
pub use runtime::{ActorContext, IterationOutcome, LabRuntime, MAIN_ACTOR};
