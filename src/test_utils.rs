//! Unit-test support: log capture, an env-var lock, and logging assertions.
//!
//! Integration tests under `tests/` carry their own copy in `tests/common`
//! because they cannot see `#[cfg(test)]` items of the library.

use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();
static ENV_VARS: Mutex<()> = Mutex::new(());

/// Seed shared by unit tests that do not care which schedule they get.
pub const DEFAULT_TEST_SEED: u64 = 0xC0FF_EE00;

/// Installs a test-writer subscriber once per process.
///
/// `RUST_LOG` overrides the default `coopsched=trace` filter.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("coopsched=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Serializes tests that read or write `COOPSCHED_*` variables.
///
/// A panicking test leaves the lock poisoned; later tests still get it.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_VARS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks the start of a test in the log.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = %$name, ">>> {}", $name)
    };
}

/// Marks a named stage inside a test.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(stage = %$name, "-- {}", $name)
    };
}

/// Marks the successful end of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "<<< {} passed", $name)
    };
}

/// `assert!` that logs both sides first, so a failing run shows them even
/// when the panic message is swallowed by a worker thread.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr $(,)?) => {{
        tracing::debug!(check = %$what, expected = ?$expected, actual = ?$actual, "checking");
        assert!($cond, "{}: expected {:?}, got {:?}", $what, $expected, $actual);
    }};
}
