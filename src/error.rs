//! Error types for the scheduler, its strategies, and trace interchange.
//!
//! Two very different things can go wrong:
//!
//! - **Cancellation** of a worker: the scheduler stopped (bug found, bound hit,
//!   schedule exhausted) and the calling actor must unwind. This is the
//!   zero-sized [`Cancelled`] marker carried by [`ScheduleResult`]. It is not a
//!   failure of the caller and must simply be propagated with `?`.
//! - **Errors** proper ([`Error`]): malformed configuration, unreadable traces,
//!   replay divergence, and misuse of the scheduler lifecycle.

use std::fmt;

/// Signal that the scheduler has stopped and the calling worker must unwind.
///
/// Every blocking scheduler call returns this instead of unwinding the stack.
/// A worker that receives it should return immediately without performing
/// further observable operations.
#[must_use = "a cancelled worker must stop; propagate this with `?`"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheduler stopped; worker cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Result of any call that may park the calling worker.
pub type ScheduleResult<T> = std::result::Result<T, Cancelled>;

/// Errors raised while replaying a recorded schedule or program model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// The live program performed more decisions than the trace holds.
    #[error("Trace is not reproducible: execution is longer than trace.")]
    ExecutionLongerThanTrace,

    /// The recorded step at the cursor is of a different kind than requested.
    #[error("Trace is not reproducible: next step is not {expected}.")]
    UnexpectedChoice {
        /// The kind of decision that was requested.
        expected: &'static str,
    },

    /// The recorded entity is not among the live enabled entities.
    #[error("Trace is not reproducible: cannot detect id '{entity}'.")]
    UnknownEntity {
        /// Raw id of the recorded entity.
        entity: u64,
    },

    /// The live program no longer follows the recorded program model.
    #[error("Program model replay diverged at step {step}: {context}")]
    Divergence {
        /// Index of the recorded step the replay expected next, if any.
        step: usize,
        /// Description of what the live program did instead.
        context: String,
    },
}

/// Crate-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A serialized trace could not be decoded.
    #[error("malformed trace: {0}")]
    TraceFormat(String),

    /// A serialized trace was produced by an incompatible schema.
    #[error("trace version mismatch: expected {expected}, found {found}")]
    TraceVersion {
        /// Schema version this build understands.
        expected: u32,
        /// Schema version found in the trace.
        found: u32,
    },

    /// Reading or writing a trace or config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `Scheduler::shutdown` was called while worker handles are still alive.
    #[error("scheduler still has {handles} live handles; join all workers before shutdown")]
    SchedulerInUse {
        /// Number of outstanding handles, including the one being shut down.
        handles: usize,
    },

    /// Replay failed.
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

impl Error {
    /// Builds a configuration error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::TraceFormat(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::TraceFormat(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::TraceFormat(err.to_string())
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;
