//! Identifier types.
//!
//! - [`EntityId`]: a schedulable entity (actor). `EntityId::HARNESS` is the
//!   test harness's own control flow, which owns the program model's root step.
//! - [`StepId`]: a dense index into a program model's step arena.
//! - [`OperationGroupId`]: correlates causally related operations.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifier of a schedulable entity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The harness's control flow. Never scheduled.
    pub const HARNESS: Self = Self(0);

    /// Target id used by `Create` operations, whose target does not exist yet.
    pub const UNASSIGNED: Self = Self(u64::MAX);

    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the harness id.
    #[must_use]
    pub const fn is_harness(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Dense index of a step in a program model.
///
/// Step ids double as the total-order position of the step: a step recorded
/// later always has a larger id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u32);

impl StepId {
    /// The root step of every program model.
    pub const ROOT: Self = Self(0);

    /// Wraps an arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({})", self.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier correlating a send with the handler it triggers.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OperationGroupId(u64);

impl OperationGroupId {
    /// Wraps a raw group id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw group id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}
