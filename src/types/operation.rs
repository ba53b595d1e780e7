//! Operation kinds an entity announces at a scheduling point.

use serde::{Deserialize, Serialize};

/// The kind of operation an entity is about to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OperationType {
    /// First run of the entity's handler.
    #[default]
    Start,
    /// Enqueue an event into some inbox.
    Send,
    /// Dequeue an event from the entity's own inbox.
    Receive,
    /// Create a new entity.
    Create,
    /// Halt.
    Stop,
    /// Make a nondeterministic choice.
    Nondeterministic,
}

impl OperationType {
    /// Whether the operation produces a schedulable program-model step.
    #[must_use]
    pub const fn is_schedulable_step(self) -> bool {
        matches!(self, Self::Start | Self::Send | Self::Receive | Self::Create)
    }
}

/// What the target id of a pending operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TargetKind {
    /// Another schedulable entity (create, start, stop).
    #[default]
    Schedulable,
    /// An entity's inbox (send, receive).
    Inbox,
}
