//! Notifications the actor runtime funnels into the scheduler.

use crate::model::step::EventDescriptor;
use crate::types::EntityId;

/// A scheduling-relevant occurrence reported by the actor runtime.
///
/// The scheduler forwards these to the active strategy, where a recording
/// strategy turns them into program-model steps and a graph replay strategy
/// matches them against the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramEvent {
    /// `creator` created `created`, an actor of type `type_name`.
    Create {
        /// Creating entity (`EntityId::HARNESS` for the harness).
        creator: EntityId,
        /// New entity.
        created: EntityId,
        /// Actor type name.
        type_name: String,
    },
    /// `entity`'s handler started running.
    Start {
        /// Started entity.
        entity: EntityId,
    },
    /// `sender` sent an event to `target`.
    Send {
        /// Sending entity.
        sender: EntityId,
        /// Receiving entity.
        target: EntityId,
        /// Event sent.
        event: EventDescriptor,
        /// Send index of this send.
        send_index: u64,
        /// False when the target had already halted and the event was dropped.
        enqueued: bool,
    },
    /// `receiver` dequeued the event sent with `send_index`.
    Receive {
        /// Receiving entity.
        receiver: EntityId,
        /// Event received.
        event: EventDescriptor,
        /// Send index of the matching send.
        send_index: u64,
    },
    /// `source` announced an event to a monitor.
    MonitorEvent {
        /// Announcing entity.
        source: EntityId,
        /// Monitor name.
        monitor: String,
        /// Event announced.
        event: EventDescriptor,
    },
    /// A monitor moved into a hot or cold state.
    MonitorStateChange {
        /// Entity whose announcement caused the change.
        source: EntityId,
        /// Monitor name.
        monitor: String,
        /// Whether the monitor is now hot.
        hot: bool,
    },
}

impl ProgramEvent {
    /// Entity that performed the occurrence.
    #[must_use]
    pub const fn source(&self) -> EntityId {
        match self {
            Self::Create { creator, .. } => *creator,
            Self::Start { entity } => *entity,
            Self::Send { sender, .. } => *sender,
            Self::Receive { receiver, .. } => *receiver,
            Self::MonitorEvent { source, .. } | Self::MonitorStateChange { source, .. } => *source,
        }
    }
}
