//! Decision traces for deterministic replay.
//!
//! The scheduler appends every decision it makes to a [`ScheduleTrace`]. The
//! richer, partially ordered record lives in [`crate::model`].

pub mod schedule;

pub use schedule::{ScheduleStep, ScheduleTrace, SCHEDULE_TRACE_VERSION};
