//! Interchange form of a program model.
//!
//! A [`ProgramTrace`] lists every step with its predecessor edges, which is
//! enough to rebuild the DAG exactly. It is written as JSON
//! ([`ProgramModel::serialize_trace`](super::ProgramModel::serialize_trace))
//! or MessagePack ([`ProgramModel::to_bytes`](super::ProgramModel::to_bytes)).

use crate::error::Error;
use crate::model::step::{Edge, EventDescriptor, ProgramStep, StepKind};
use crate::types::{EntityId, StepId};
use serde::{Deserialize, Serialize};

/// Schema version written into every program trace.
pub const PROGRAM_TRACE_VERSION: u32 = 1;

/// Serialized program model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTrace {
    /// Schema version.
    pub version: u32,
    /// Steps in execution order; `steps[i].index == i`.
    pub steps: Vec<TraceStep>,
    /// Actor type of each created entity.
    pub entity_types: Vec<(EntityId, String)>,
    /// Step blamed for the bug, if one was found.
    #[serde(default)]
    pub bug_triggering_step: Option<StepId>,
    /// Sends whose target had already halted.
    #[serde(default)]
    pub dropped_sends: Vec<StepId>,
}

/// Serialized step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    /// Step index.
    pub index: StepId,
    /// Step kind.
    pub kind: StepKind,
    /// Performing entity.
    pub source: EntityId,
    /// Target entity.
    pub target: EntityId,
    /// Event descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDescriptor>,
    /// Monitor name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<String>,
    /// Send index.
    #[serde(default)]
    pub send_index: u64,
    /// Scheduling index.
    pub scheduled_at: u64,
    /// Predecessor edges.
    #[serde(default)]
    pub preds: Vec<Edge>,
}

impl From<&ProgramStep> for TraceStep {
    fn from(step: &ProgramStep) -> Self {
        Self {
            index: step.id,
            kind: step.kind,
            source: step.source,
            target: step.target,
            event: step.event.clone(),
            monitor: step.monitor.clone(),
            send_index: step.send_index,
            scheduled_at: step.scheduled_at,
            preds: step.preds.to_vec(),
        }
    }
}

impl ProgramTrace {
    /// Checks the schema version, index density, and edge direction.
    pub fn validate(&self) -> Result<(), Error> {
        if self.version != PROGRAM_TRACE_VERSION {
            return Err(Error::TraceVersion {
                expected: PROGRAM_TRACE_VERSION,
                found: self.version,
            });
        }
        if self.steps.is_empty() {
            return Err(Error::TraceFormat("program trace has no root step".into()));
        }
        for (position, step) in self.steps.iter().enumerate() {
            if step.index.index() != position {
                return Err(Error::TraceFormat(format!(
                    "step {} stored at position {position}",
                    step.index
                )));
            }
            if let Some(edge) = step.preds.iter().find(|edge| edge.step >= step.index) {
                return Err(Error::TraceFormat(format!(
                    "step {} has non-forward predecessor {}",
                    step.index, edge.step
                )));
            }
        }
        if let Some(bug) = self.bug_triggering_step {
            if bug.index() >= self.steps.len() {
                return Err(Error::TraceFormat(format!(
                    "bug-triggering step {bug} out of range"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, ProgramModel};

    fn root_only() -> ProgramTrace {
        ProgramModel::new().to_trace()
    }

    #[test]
    fn rejects_wrong_version() {
        let mut trace = root_only();
        trace.version = 99;
        let err = trace.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::TraceVersion {
                expected: PROGRAM_TRACE_VERSION,
                found: 99
            }
        ));
    }

    #[test]
    fn rejects_backward_edges() {
        let mut trace = root_only();
        trace.steps.push(TraceStep {
            index: StepId::new(1),
            kind: StepKind::Start,
            source: EntityId::new(1),
            target: EntityId::new(1),
            event: None,
            monitor: None,
            send_index: 0,
            scheduled_at: 0,
            preds: vec![Edge {
                kind: EdgeKind::Program,
                step: StepId::new(1),
            }],
        });
        let msg = trace.validate().unwrap_err().to_string();
        assert!(msg.contains("non-forward"), "{msg}");
    }

    #[test]
    fn rejects_sparse_indices() {
        let mut trace = root_only();
        trace.steps[0].index = StepId::new(4);
        assert!(trace.validate().is_err());
    }

    #[test]
    fn empty_trace_is_malformed() {
        let mut trace = root_only();
        trace.steps.clear();
        assert!(matches!(trace.validate(), Err(Error::TraceFormat(_))));
    }
}
