#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use coopsched::lab::{ActorContext, Event};
use coopsched::{EntityId, ScheduleResult, SchedulerConfig};
use parking_lot::Mutex;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Default seed used by test configurations.
pub const DEFAULT_TEST_SEED: u64 = 0xDEAD_BEEF;
/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "COOPSCHED_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    // Honor an existing PROPTEST_RNG_SEED, otherwise apply our own.
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    std::env::var("CI").ok().map(|_| DEFAULT_PROPTEST_SEED)
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Configuration with the default test seed.
#[must_use]
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::new(DEFAULT_TEST_SEED)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

// ============================================================================
// Harness programs
// ============================================================================

/// Main sends `rounds` pings to a handler-style server and waits for each pong.
pub fn ping_pong(rounds: u64) -> impl Fn(&ActorContext) -> ScheduleResult<()> + Send + Sync {
    move |ctx| {
        let server = ctx.create_actor("Server", |ctx| loop {
            let ping = ctx.next_event()?;
            let client = EntityId::new(ping.value().unwrap_or_default());
            ctx.send(client, Event::with_value("Pong", ping.value().unwrap_or_default()))?;
        })?;
        for _ in 0..rounds {
            ctx.send(server, Event::with_value("Ping", ctx.id().as_u64()))?;
            let pong = ctx.receive()?;
            ctx.assert(pong.type_name() == "Pong", "client expects a pong")?;
        }
        Ok(())
    }
}

/// Two workers increment a shared counter with a send between the read and
/// the write. Interleaving them loses an update, which main asserts against.
pub fn lost_update(ctx: &ActorContext) -> ScheduleResult<()> {
    let counter = Arc::new(Mutex::new(0_u32));
    let main = ctx.id();
    let sink = ctx.create_actor("Sink", |ctx| loop {
        ctx.next_event()?;
    })?;
    for name in ["IncA", "IncB"] {
        let counter = Arc::clone(&counter);
        ctx.create_actor(name, move |ctx| {
            let seen = *counter.lock();
            ctx.send(sink, Event::new("Tick"))?;
            *counter.lock() = seen + 1;
            ctx.send(main, Event::new("Done"))
        })?;
    }
    ctx.receive()?;
    ctx.receive()?;
    let total = *counter.lock();
    ctx.assert(total == 2, "lost update: counter is not 2")
}

/// Main creates two actors that each flip one coin and log the result.
pub fn coin_pair(
    log: Arc<Mutex<Vec<(String, bool)>>>,
) -> impl Fn(&ActorContext) -> ScheduleResult<()> + Send + Sync {
    move |ctx| {
        for name in ["A", "B"] {
            let log = Arc::clone(&log);
            ctx.create_actor(name, move |ctx| {
                let value = ctx.random_bool()?;
                log.lock().push((name.to_owned(), value));
                Ok(())
            })?;
        }
        Ok(())
    }
}
