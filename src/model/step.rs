//! Program-model step records.

use crate::types::{EntityId, OperationType, StepId};
use core::fmt;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// What a step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum StepKind {
    /// An entity created another.
    Create,
    /// An entity's handler started.
    Start,
    /// An event was sent.
    Send,
    /// An event was dequeued.
    Receive,
    /// A nondeterministic boolean was chosen.
    NondetBool(bool),
    /// A nondeterministic integer was chosen.
    NondetInt(u32),
    /// An event was announced to a monitor.
    MonitorEvent,
    /// A monitor entered a hot (`true`) or cold (`false`) state.
    MonitorStateChange(bool),
}

impl StepKind {
    /// Whether the step is reached through an entity scheduling decision.
    ///
    /// Non-schedulable steps (choices, monitor notifications) happen while their
    /// entity is already running.
    #[must_use]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Create | Self::Start | Self::Send | Self::Receive)
    }

    /// The scheduling-point operation that produces this step, if any.
    #[must_use]
    pub const fn operation_type(self) -> Option<OperationType> {
        match self {
            Self::Create => Some(OperationType::Create),
            Self::Start => Some(OperationType::Start),
            Self::Send => Some(OperationType::Send),
            Self::Receive => Some(OperationType::Receive),
            Self::NondetBool(_) | Self::NondetInt(_) => Some(OperationType::Nondeterministic),
            Self::MonitorEvent | Self::MonitorStateChange(_) => None,
        }
    }

    /// Short label for logs and text dumps.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Start => "Start",
            Self::Send => "Send",
            Self::Receive => "Receive",
            Self::NondetBool(_) => "NondetBool",
            Self::NondetInt(_) => "NondetInt",
            Self::MonitorEvent => "MonitorEvent",
            Self::MonitorStateChange(_) => "MonitorStateChange",
        }
    }
}

/// Opaque description of an event, used for matching and minimization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Event type name.
    pub type_name: String,
    /// Hash of the event payload, when the sender provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<u64>,
}

impl EventDescriptor {
    /// Descriptor carrying only a type name.
    #[must_use]
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            content_hash: None,
        }
    }

    /// Descriptor with a payload hash.
    #[must_use]
    pub fn with_hash(type_name: impl Into<String>, content_hash: u64) -> Self {
        Self {
            type_name: type_name.into(),
            content_hash: Some(content_hash),
        }
    }
}

/// Why one step is ordered before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Consecutive steps of one entity.
    Program,
    /// Create to start, or send to the receive consuming it.
    Creation,
    /// Successive sends into one inbox, or successive receives from it.
    Inbox,
    /// Successive notifications of one monitor.
    Monitor,
}

/// A typed edge to another step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Edge kind.
    pub kind: EdgeKind,
    /// The step at the other end.
    pub step: StepId,
}

/// One node of the program model DAG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStep {
    /// Position in the total order; also the arena index.
    pub id: StepId,
    /// What happened.
    pub kind: StepKind,
    /// Entity that performed the step.
    pub source: EntityId,
    /// Entity the step was directed at (the source itself for local steps).
    pub target: EntityId,
    /// Event involved, if any.
    pub event: Option<EventDescriptor>,
    /// Monitor name for monitor steps.
    pub monitor: Option<String>,
    /// Send index of the send, or of the send a receive consumed. Zero otherwise.
    pub send_index: u64,
    /// Strategy decisions made before the step was recorded.
    pub scheduled_at: u64,
    pub(crate) preds: SmallVec<[Edge; 2]>,
    pub(crate) succs: SmallVec<[Edge; 2]>,
}

impl ProgramStep {
    pub(crate) fn new(id: StepId, kind: StepKind, source: EntityId, target: EntityId) -> Self {
        Self {
            id,
            kind,
            source,
            target,
            event: None,
            monitor: None,
            send_index: 0,
            scheduled_at: 0,
            preds: SmallVec::new(),
            succs: SmallVec::new(),
        }
    }

    /// Incoming edges.
    #[must_use]
    pub fn preds(&self) -> &[Edge] {
        &self.preds
    }

    /// Outgoing edges.
    #[must_use]
    pub fn succs(&self) -> &[Edge] {
        &self.succs
    }

    /// For a receive, the send it consumed. For a start, the creating step.
    #[must_use]
    pub fn creation_pred(&self) -> Option<StepId> {
        self.preds
            .iter()
            .find(|e| e.kind == EdgeKind::Creation)
            .map(|e| e.step)
    }

    /// Whether two steps describe the same action, ignoring graph position.
    #[must_use]
    pub fn same_action(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.source == other.source
            && self.target == other.target
            && self.event == other.event
            && self.monitor == other.monitor
    }
}

impl fmt::Display for ProgramStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.kind.label())?;
        match self.kind {
            StepKind::NondetBool(v) => write!(f, "({v})")?,
            StepKind::NondetInt(v) => write!(f, "({v})")?,
            StepKind::MonitorStateChange(hot) => {
                write!(f, "({})", if hot { "hot" } else { "cold" })?;
            }
            _ => {}
        }
        write!(f, " {} -> {}", self.source, self.target)?;
        if let Some(event) = &self.event {
            write!(f, " [{}]", event.type_name)?;
        }
        if let Some(monitor) = &self.monitor {
            write!(f, " <{monitor}>")?;
        }
        write!(f, " @{}", self.scheduled_at)
    }
}
