//! Environment variable and config file support for [`SchedulerConfig`].
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: builder methods (`SchedulerConfig::new(7).iterations(100)`)
//! 2. **Environment variables**: `COOPSCHED_*`
//! 3. **Config file**: a TOML file (requires the `config-file` feature)
//! 4. **Defaults**: [`SchedulerConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `COOPSCHED_SEED` | `u64` | `seed` |
//! | `COOPSCHED_ITERATIONS` | `u64` | `iterations` |
//! | `COOPSCHED_MAX_FAIR_STEPS` | `u64` | `max_fair_steps` |
//! | `COOPSCHED_MAX_UNFAIR_STEPS` | `u64` | `max_unfair_steps` |
//! | `COOPSCHED_DEPTH_BOUND_IS_BUG` | `bool` | `depth_bound_is_bug` |
//! | `COOPSCHED_STRATEGY` | `random`/`round-robin`/`dfs` | `strategy` |
//! | `COOPSCHED_REPLAY_MISMATCH` | `fallback`/`fail` | `replay_mismatch` |
//! | `COOPSCHED_CACHE_PROGRAM_STATE` | `bool` | `cache_program_state` |
//! | `COOPSCHED_RECORD_PROGRAM_MODEL` | `bool` | `record_program_model` |
//! | `COOPSCHED_STOP_ON_FIRST_BUG` | `bool` | `stop_on_first_bug` |

use crate::error::Error;
use crate::runtime::config::{ReplayMismatchPolicy, SchedulerConfig, StrategyKind};

/// Environment variable name for the strategy seed.
pub const ENV_SEED: &str = "COOPSCHED_SEED";
/// Environment variable name for the iteration count.
pub const ENV_ITERATIONS: &str = "COOPSCHED_ITERATIONS";
/// Environment variable name for the fair step bound.
pub const ENV_MAX_FAIR_STEPS: &str = "COOPSCHED_MAX_FAIR_STEPS";
/// Environment variable name for the unfair step bound.
pub const ENV_MAX_UNFAIR_STEPS: &str = "COOPSCHED_MAX_UNFAIR_STEPS";
/// Environment variable name for treating bound hits as bugs.
pub const ENV_DEPTH_BOUND_IS_BUG: &str = "COOPSCHED_DEPTH_BOUND_IS_BUG";
/// Environment variable name for the exploration strategy.
pub const ENV_STRATEGY: &str = "COOPSCHED_STRATEGY";
/// Environment variable name for the replay mismatch policy.
pub const ENV_REPLAY_MISMATCH: &str = "COOPSCHED_REPLAY_MISMATCH";
/// Environment variable name for program-state fingerprinting.
pub const ENV_CACHE_PROGRAM_STATE: &str = "COOPSCHED_CACHE_PROGRAM_STATE";
/// Environment variable name for program-model recording.
pub const ENV_RECORD_PROGRAM_MODEL: &str = "COOPSCHED_RECORD_PROGRAM_MODEL";
/// Environment variable name for stopping at the first bug.
pub const ENV_STOP_ON_FIRST_BUG: &str = "COOPSCHED_STOP_ON_FIRST_BUG";

/// Apply environment variable overrides to a [`SchedulerConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut SchedulerConfig) -> Result<(), Error> {
    if let Some(val) = read_env(ENV_SEED) {
        config.seed = parse_u64(ENV_SEED, &val)?;
    }
    if let Some(val) = read_env(ENV_ITERATIONS) {
        config.iterations = parse_u64(ENV_ITERATIONS, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_FAIR_STEPS) {
        config.max_fair_steps = parse_u64(ENV_MAX_FAIR_STEPS, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_UNFAIR_STEPS) {
        config.max_unfair_steps = parse_u64(ENV_MAX_UNFAIR_STEPS, &val)?;
    }
    if let Some(val) = read_env(ENV_DEPTH_BOUND_IS_BUG) {
        config.depth_bound_is_bug = parse_bool(ENV_DEPTH_BOUND_IS_BUG, &val)?;
    }
    if let Some(val) = read_env(ENV_STRATEGY) {
        config.strategy = parse_strategy(ENV_STRATEGY, &val)?;
    }
    if let Some(val) = read_env(ENV_REPLAY_MISMATCH) {
        config.replay_mismatch = parse_policy(ENV_REPLAY_MISMATCH, &val)?;
    }
    if let Some(val) = read_env(ENV_CACHE_PROGRAM_STATE) {
        config.cache_program_state = parse_bool(ENV_CACHE_PROGRAM_STATE, &val)?;
    }
    if let Some(val) = read_env(ENV_RECORD_PROGRAM_MODEL) {
        config.record_program_model = parse_bool(ENV_RECORD_PROGRAM_MODEL, &val)?;
    }
    if let Some(val) = read_env(ENV_STOP_ON_FIRST_BUG) {
        config.stop_on_first_bug = parse_bool(ENV_STOP_ON_FIRST_BUG, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var_name: &str, val: &str) -> Result<u64, Error> {
    val.trim().parse::<u64>().map_err(|e| {
        Error::config(format!(
            "invalid value for {var_name}: expected unsigned integer, got {val:?} ({e})"
        ))
    })
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, Error> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "invalid value for {var_name}: expected bool (true/false/1/0/yes/no), got {val:?}"
        ))),
    }
}

fn parse_strategy(var_name: &str, val: &str) -> Result<StrategyKind, Error> {
    StrategyKind::parse(val).ok_or_else(|| {
        Error::config(format!(
            "invalid value for {var_name}: expected random/round-robin/dfs, got {val:?}"
        ))
    })
}

fn parse_policy(var_name: &str, val: &str) -> Result<ReplayMismatchPolicy, Error> {
    ReplayMismatchPolicy::parse(val).ok_or_else(|| {
        Error::config(format!(
            "invalid value for {var_name}: expected fallback/fail, got {val:?}"
        ))
    })
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable scheduler configuration.
///
/// ```toml
/// [exploration]
/// seed = 7
/// iterations = 1000
/// strategy = "dfs"
/// stop_on_first_bug = true
///
/// [bounds]
/// max_fair_steps = 100000
/// max_unfair_steps = 10000
/// depth_bound_is_bug = false
///
/// [replay]
/// mismatch = "fail"
/// record_program_model = true
/// cache_program_state = false
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct SchedulerTomlConfig {
    /// Exploration settings.
    #[serde(default)]
    pub exploration: ExplorationToml,
    /// Step bound settings.
    #[serde(default)]
    pub bounds: BoundsToml,
    /// Replay and recording settings.
    #[serde(default)]
    pub replay: ReplayToml,
}

/// Exploration section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ExplorationToml {
    /// Strategy seed.
    pub seed: Option<u64>,
    /// Iteration count.
    pub iterations: Option<u64>,
    /// Exploration strategy.
    pub strategy: Option<StrategyKind>,
    /// Stop at the first buggy iteration.
    pub stop_on_first_bug: Option<bool>,
}

/// Bounds section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct BoundsToml {
    /// Fair step bound.
    pub max_fair_steps: Option<u64>,
    /// Unfair step bound.
    pub max_unfair_steps: Option<u64>,
    /// Treat bound hits as bugs.
    pub depth_bound_is_bug: Option<bool>,
}

/// Replay section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ReplayToml {
    /// Mismatch policy.
    pub mismatch: Option<TomlMismatch>,
    /// Record a program model.
    pub record_program_model: Option<bool>,
    /// Fingerprint program states.
    pub cache_program_state: Option<bool>,
}

/// Mismatch policy spelling accepted in TOML files.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TomlMismatch {
    /// [`ReplayMismatchPolicy::FallBackToSuffix`].
    Fallback,
    /// [`ReplayMismatchPolicy::Fail`].
    Fail,
}

/// Apply a parsed TOML config to a [`SchedulerConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut SchedulerConfig, toml: &SchedulerTomlConfig) {
    if let Some(v) = toml.exploration.seed {
        config.seed = v;
    }
    if let Some(v) = toml.exploration.iterations {
        config.iterations = v;
    }
    if let Some(v) = toml.exploration.strategy {
        config.strategy = v;
    }
    if let Some(v) = toml.exploration.stop_on_first_bug {
        config.stop_on_first_bug = v;
    }
    if let Some(v) = toml.bounds.max_fair_steps {
        config.max_fair_steps = v;
    }
    if let Some(v) = toml.bounds.max_unfair_steps {
        config.max_unfair_steps = v;
    }
    if let Some(v) = toml.bounds.depth_bound_is_bug {
        config.depth_bound_is_bug = v;
    }
    if let Some(v) = toml.replay.mismatch {
        config.replay_mismatch = match v {
            TomlMismatch::Fallback => ReplayMismatchPolicy::FallBackToSuffix,
            TomlMismatch::Fail => ReplayMismatchPolicy::Fail,
        };
    }
    if let Some(v) = toml.replay.record_program_model {
        config.record_program_model = v;
    }
    if let Some(v) = toml.replay.cache_program_state {
        config.cache_program_state = v;
    }
}

/// Parse a TOML string into a [`SchedulerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<SchedulerTomlConfig, Error> {
    toml::from_str(toml_str)
        .map_err(|e| Error::config(format!("failed to parse TOML config: {e}")))
}

/// Read and parse a TOML file into a [`SchedulerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<SchedulerTomlConfig, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: &[&str] = &[
        ENV_SEED,
        ENV_ITERATIONS,
        ENV_MAX_FAIR_STEPS,
        ENV_MAX_UNFAIR_STEPS,
        ENV_DEPTH_BOUND_IS_BUG,
        ENV_STRATEGY,
        ENV_REPLAY_MISMATCH,
        ENV_CACHE_PROGRAM_STATE,
        ENV_RECORD_PROGRAM_MODEL,
        ENV_STOP_ON_FIRST_BUG,
    ];

    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = crate::test_utils::env_lock();
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
        f()
    }

    fn with_envs<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        with_clean_env(|| {
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
            let result = f();
            for (k, _) in vars {
                std::env::remove_var(k);
            }
            result
        })
    }

    #[test]
    fn parse_bool_all_spellings() {
        for t in ["true", "1", "yes", "on", " TRUE "] {
            assert!(super::parse_bool("TEST", t).unwrap(), "{t}");
        }
        for f in ["false", "0", "no", "off"] {
            assert!(!super::parse_bool("TEST", f).unwrap(), "{f}");
        }
        assert!(super::parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        assert_eq!(super::parse_u64("TEST", " 42 ").unwrap(), 42);
        let msg = super::parse_u64("TEST", "-3").unwrap_err().to_string();
        assert!(msg.contains("TEST"), "{msg}");
    }

    #[test]
    fn env_overrides_multiple() {
        with_envs(
            &[
                (ENV_SEED, "99"),
                (ENV_ITERATIONS, "250"),
                (ENV_MAX_UNFAIR_STEPS, "64"),
                (ENV_DEPTH_BOUND_IS_BUG, "yes"),
                (ENV_STRATEGY, "dfs"),
                (ENV_REPLAY_MISMATCH, "fail"),
            ],
            || {
                let mut config = SchedulerConfig::default();
                apply_env_overrides(&mut config).unwrap();
                assert_eq!(config.seed, 99);
                assert_eq!(config.iterations, 250);
                assert_eq!(config.max_unfair_steps, 64);
                assert!(config.depth_bound_is_bug);
                assert_eq!(config.strategy, StrategyKind::Dfs);
                assert_eq!(config.replay_mismatch, ReplayMismatchPolicy::Fail);
                assert_eq!(
                    config.max_fair_steps,
                    SchedulerConfig::default().max_fair_steps
                );
            },
        );
    }

    #[test]
    fn env_overrides_unset_vars_leave_defaults() {
        with_clean_env(|| {
            let mut config = SchedulerConfig::new(5);
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config, SchedulerConfig::new(5));
        });
    }

    #[test]
    fn env_overrides_invalid_strategy_returns_error() {
        with_envs(&[(ENV_STRATEGY, "telepathy")], || {
            let mut config = SchedulerConfig::default();
            let err = apply_env_overrides(&mut config).unwrap_err();
            assert!(err.to_string().contains(ENV_STRATEGY));
        });
    }
}
