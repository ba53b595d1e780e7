//! Logging macros used throughout the crate.
//!
//! Build with `tracing-integration` and these are re-exports of the `tracing`
//! macros. Without the feature each one swallows its arguments and expands to `()`,
//! so the per-scheduling-point `trace!` calls compile away entirely while
//! still being usable in expression position such as a match arm.
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! trace!(entity = %id, op = ?op, "scheduling point");
//! debug!(steps = 42, "iteration finished");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod disabled {
    /// Discards a trace-level event.
    #[macro_export]
    macro_rules! trace {
        ($($tokens:tt)*) => {
            ()
        };
    }

    /// Discards a debug-level event.
    #[macro_export]
    macro_rules! debug {
        ($($tokens:tt)*) => {
            ()
        };
    }

    /// Discards an info-level event.
    #[macro_export]
    macro_rules! info {
        ($($tokens:tt)*) => {
            ()
        };
    }

    /// Discards a warn-level event.
    #[macro_export]
    macro_rules! warn {
        ($($tokens:tt)*) => {
            ()
        };
    }

    /// Discards an error-level event.
    #[macro_export]
    macro_rules! error {
        ($($tokens:tt)*) => {
            ()
        };
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use disabled::*;
