//! Scheduling strategies.
//!
//! A strategy is the decision oracle behind the [`Scheduler`](crate::Scheduler):
//! at every scheduling point it picks the next entity to run, and at every
//! nondeterministic choice it picks the value.
//!
//! # Strategies
//!
//! | Strategy | Fair | Decides |
//! |----------|------|---------|
//! | [`RandomStrategy`] | yes | seeded uniform choice |
//! | [`RoundRobinStrategy`] | yes | next id after the last one chosen |
//! | [`DfsStrategy`] | no | exhaustive depth-first enumeration |
//! | [`ProgramModelStrategy`] | inner | forwards to a wrapped strategy, recording a model |
//! | [`ReplayStrategy`] | suffix | a recorded [`ScheduleTrace`](crate::ScheduleTrace) |
//! | [`GraphReplayStrategy`] | recorded | a recorded [`ProgramModel`](crate::ProgramModel) |
//!
//! Candidates are always presented in ascending id order, so every strategy
//! breaks ties the same way given the same state.

pub mod dfs;
pub mod graph_replay;
pub mod random;
pub mod recording;
pub mod replay;
pub mod round_robin;

pub use dfs::DfsStrategy;
pub use graph_replay::GraphReplayStrategy;
pub use random::RandomStrategy;
pub use recording::ProgramModelStrategy;
pub use replay::ReplayStrategy;
pub use round_robin::RoundRobinStrategy;

use crate::error::ReplayError;
use crate::model::{ProgramEvent, ProgramModel};
use crate::types::{EntityId, OperationGroupId, OperationType, TargetKind};
use std::fmt;
use std::sync::Arc;

/// Snapshot of one live entity handed to a strategy at a scheduling point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationView {
    /// Entity id.
    pub id: EntityId,
    /// Entity name.
    pub name: Arc<str>,
    /// Whether the entity may be chosen.
    pub is_enabled: bool,
    /// Whether the entity is blocked in an explicit receive.
    pub is_waiting_to_receive: bool,
    /// Operation the entity performs once chosen.
    pub next_operation: OperationType,
    /// Kind of the operation's target.
    pub target_kind: TargetKind,
    /// Target of the operation.
    pub target_id: EntityId,
    /// Send index a pending receive will consume.
    pub matching_send_index: u64,
    /// Current operation group.
    pub operation_group: OperationGroupId,
}

/// Enabled entities among `ops`, preserving ascending id order.
pub fn enabled(ops: &[OperationView]) -> impl Iterator<Item = &OperationView> + '_ {
    ops.iter().filter(|op| op.is_enabled)
}

/// Decision oracle consulted by the scheduler.
///
/// All methods are called under the scheduler's state lock, from whichever
/// worker is currently active.
pub trait SchedulingStrategy: Send + fmt::Debug {
    /// Picks the next entity among `ops` (sorted by id), or `None` to end the run.
    fn next_operation(&mut self, ops: &[OperationView], current: EntityId) -> Option<EntityId>;

    /// Picks a boolean for `current`, or `None` to end the run.
    fn next_boolean_choice(&mut self, current: EntityId, max_value: u32) -> Option<bool>;

    /// Picks an integer in `[0, max_value)` for `current`, or `None` to end the run.
    ///
    /// `max_value == 0` is treated as the one-value range `[0, 1)`, so every
    /// strategy answers 0 and still counts the decision.
    fn next_integer_choice(&mut self, current: EntityId, max_value: u32) -> Option<u32>;

    /// Prepares the next iteration. Returns `false` when exploration is complete.
    fn prepare_for_next_iteration(&mut self) -> bool;

    /// Returns the strategy to its initial state.
    fn reset(&mut self);

    /// Decisions made in the current iteration.
    fn scheduled_steps(&self) -> u64;

    /// Whether the current iteration used up the step bound.
    fn has_reached_max_scheduling_steps(&self) -> bool;

    /// Whether the strategy satisfies the fairness contract.
    fn is_fair(&self) -> bool;

    /// Description used in bug reports.
    fn description(&self) -> String;

    /// Observes a runtime occurrence. Never changes a decision.
    fn observe(&mut self, _event: &ProgramEvent) {}

    /// The current iteration ended.
    fn notify_scheduling_ended(&mut self, _bug_found: bool) {}

    /// Program model recorded for the current iteration, if this strategy records one.
    fn program_model(&self) -> Option<&ProgramModel> {
        None
    }

    /// Why a replaying strategy stopped producing decisions, if it failed.
    fn replay_error(&self) -> Option<&ReplayError> {
        None
    }
}
