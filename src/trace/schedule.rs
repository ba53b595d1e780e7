//! Flat schedule traces.
//!
//! A [`ScheduleTrace`] is the decision history of one run: which entity was
//! chosen at each scheduling point and which value each nondeterministic choice
//! returned. Feeding it to a [`ReplayStrategy`](crate::strategy::ReplayStrategy)
//! reproduces the run as long as the program is deterministic given its
//! decisions.

use crate::error::Error;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};

/// Schema version written into every schedule trace.
pub const SCHEDULE_TRACE_VERSION: u32 = 1;

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScheduleStep {
    /// The scheduler chose `entity` to run next.
    SchedulingChoice {
        /// Chosen entity.
        entity: EntityId,
    },
    /// A nondeterministic boolean choice.
    BooleanChoice {
        /// Value returned.
        value: bool,
        /// Identifier of a fair choice, when the program supplied one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fair_id: Option<String>,
    },
    /// A nondeterministic integer choice.
    IntegerChoice {
        /// Value returned.
        value: u32,
    },
}

impl ScheduleStep {
    /// Human-readable name of the decision kind.
    #[must_use]
    pub const fn describe_kind(&self) -> &'static str {
        match self {
            Self::SchedulingChoice { .. } => "a scheduling choice",
            Self::BooleanChoice { .. } => "a nondeterministic boolean choice",
            Self::IntegerChoice { .. } => "a nondeterministic integer choice",
        }
    }
}

/// Ordered decision history of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTrace {
    version: u32,
    steps: Vec<ScheduleStep>,
}

impl Default for ScheduleTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleTrace {
    /// Creates an empty trace.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: SCHEDULE_TRACE_VERSION,
            steps: Vec::new(),
        }
    }

    /// Builds a trace from explicit steps.
    #[must_use]
    pub fn from_steps(steps: Vec<ScheduleStep>) -> Self {
        Self {
            version: SCHEDULE_TRACE_VERSION,
            steps,
        }
    }

    /// Appends a scheduling choice.
    pub fn push_scheduling_choice(&mut self, entity: EntityId) {
        self.steps.push(ScheduleStep::SchedulingChoice { entity });
    }

    /// Appends a boolean choice.
    pub fn push_boolean_choice(&mut self, value: bool, fair_id: Option<String>) {
        self.steps.push(ScheduleStep::BooleanChoice { value, fair_id });
    }

    /// Appends an integer choice.
    pub fn push_integer_choice(&mut self, value: u32) {
        self.steps.push(ScheduleStep::IntegerChoice { value });
    }

    /// Number of decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no decision was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Decision at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ScheduleStep> {
        self.steps.get(index)
    }

    /// All decisions in order.
    #[must_use]
    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    /// Entities chosen at scheduling points, in order.
    pub fn scheduling_choices(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.steps.iter().filter_map(|step| match step {
            ScheduleStep::SchedulingChoice { entity } => Some(*entity),
            _ => None,
        })
    }

    /// Serializes as JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let trace: Self = serde_json::from_str(text)?;
        trace.check_version()
    }

    /// Serializes as MessagePack.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Parses MessagePack produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let trace: Self = rmp_serde::from_slice(bytes)?;
        trace.check_version()
    }

    /// Writes the JSON form to `path`.
    pub fn write_to(&self, path: &std::path::Path) -> crate::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a JSON trace from `path`.
    pub fn read_from(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn check_version(self) -> crate::Result<Self> {
        if self.version == SCHEDULE_TRACE_VERSION {
            Ok(self)
        } else {
            Err(Error::TraceVersion {
                expected: SCHEDULE_TRACE_VERSION,
                found: self.version,
            })
        }
    }
}
