//! Core identifier and operation types.

pub mod id;
pub mod operation;

pub use id::{EntityId, OperationGroupId, StepId};
pub use operation::{OperationType, TargetKind};
