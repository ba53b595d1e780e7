//! Scheduler configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `seed` | `0` |
//! | `iterations` | `1` |
//! | `max_fair_steps` | `100_000` |
//! | `max_unfair_steps` | `10_000` |
//! | `depth_bound_is_bug` | `false` |
//! | `strategy` | [`StrategyKind::Random`] |
//! | `replay_mismatch` | [`ReplayMismatchPolicy::FallBackToSuffix`] |
//! | `cache_program_state` | `false` |
//! | `record_program_model` | `true` |
//! | `stop_on_first_bug` | `true` |
//!
//! Environment variables and TOML files can override these; see
//! [`env_config`](super::env_config).

use crate::strategy::{DfsStrategy, RandomStrategy, RoundRobinStrategy, SchedulingStrategy};
use serde::{Deserialize, Serialize};

/// Which exploration strategy an engine builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Seeded uniform random choice. Fair.
    #[default]
    Random,
    /// Cyclic choice by entity id. Fair and deterministic.
    RoundRobin,
    /// Exhaustive depth-first search. Unfair.
    Dfs,
}

impl StrategyKind {
    /// Parses the names accepted in environment variables and TOML files.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "random" => Some(Self::Random),
            "round-robin" | "roundrobin" | "rr" => Some(Self::RoundRobin),
            "dfs" => Some(Self::Dfs),
            _ => None,
        }
    }

    /// Whether the strategy satisfies the fairness contract.
    #[must_use]
    pub const fn is_fair(self) -> bool {
        !matches!(self, Self::Dfs)
    }
}

/// What a replay does when the live program stops matching the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayMismatchPolicy {
    /// Hand the rest of the run to the suffix strategy, when one is configured.
    /// Without a suffix strategy this behaves like [`Self::Fail`].
    #[default]
    FallBackToSuffix,
    /// Report a replay divergence bug and stop the run.
    Fail,
}

impl ReplayMismatchPolicy {
    /// Parses the names accepted in environment variables and TOML files.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fallback" | "fall-back" | "suffix" => Some(Self::FallBackToSuffix),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Configuration shared by the scheduler and the iteration engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Seed for randomized strategies.
    pub seed: u64,
    /// Iterations the testing engine runs.
    pub iterations: u64,
    /// Step bound for fair strategies.
    pub max_fair_steps: u64,
    /// Step bound for unfair strategies.
    pub max_unfair_steps: u64,
    /// Report hitting the step bound as a bug instead of stopping cleanly.
    pub depth_bound_is_bug: bool,
    /// Strategy built by the testing engine.
    pub strategy: StrategyKind,
    /// Replay behavior on mismatch.
    pub replay_mismatch: ReplayMismatchPolicy,
    /// Fingerprint the program state at every scheduling point.
    pub cache_program_state: bool,
    /// Wrap the strategy in a program-model recorder.
    pub record_program_model: bool,
    /// Stop the testing engine at the first iteration that finds a bug.
    pub stop_on_first_bug: bool,
}

impl SchedulerConfig {
    /// Creates a configuration with the given seed and defaults elsewhere.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            iterations: 1,
            max_fair_steps: 100_000,
            max_unfair_steps: 10_000,
            depth_bound_is_bug: false,
            strategy: StrategyKind::Random,
            replay_mismatch: ReplayMismatchPolicy::FallBackToSuffix,
            cache_program_state: false,
            record_program_model: true,
            stop_on_first_bug: true,
        }
    }

    /// Sets the number of iterations.
    #[must_use]
    pub const fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the step bound for fair strategies.
    #[must_use]
    pub const fn max_fair_steps(mut self, steps: u64) -> Self {
        self.max_fair_steps = steps;
        self
    }

    /// Sets the step bound for unfair strategies.
    #[must_use]
    pub const fn max_unfair_steps(mut self, steps: u64) -> Self {
        self.max_unfair_steps = steps;
        self
    }

    /// Sets both step bounds.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_fair_steps = steps;
        self.max_unfair_steps = steps;
        self
    }

    /// Sets whether hitting the step bound is a bug.
    #[must_use]
    pub const fn depth_bound_is_bug(mut self, value: bool) -> Self {
        self.depth_bound_is_bug = value;
        self
    }

    /// Sets the exploration strategy.
    #[must_use]
    pub const fn strategy(mut self, kind: StrategyKind) -> Self {
        self.strategy = kind;
        self
    }

    /// Sets the replay mismatch policy.
    #[must_use]
    pub const fn replay_mismatch(mut self, policy: ReplayMismatchPolicy) -> Self {
        self.replay_mismatch = policy;
        self
    }

    /// Sets whether program states are fingerprinted.
    #[must_use]
    pub const fn cache_program_state(mut self, value: bool) -> Self {
        self.cache_program_state = value;
        self
    }

    /// Sets whether a program model is recorded.
    #[must_use]
    pub const fn record_program_model(mut self, value: bool) -> Self {
        self.record_program_model = value;
        self
    }

    /// Sets whether the engine stops at the first buggy iteration.
    #[must_use]
    pub const fn stop_on_first_bug(mut self, value: bool) -> Self {
        self.stop_on_first_bug = value;
        self
    }

    /// Step bound that applies to a strategy of the given fairness.
    #[must_use]
    pub const fn step_bound(&self, fair: bool) -> u64 {
        if fair {
            self.max_fair_steps
        } else {
            self.max_unfair_steps
        }
    }

    /// Builds the configured exploration strategy.
    #[must_use]
    pub fn build_strategy(&self) -> Box<dyn SchedulingStrategy> {
        let bound = self.step_bound(self.strategy.is_fair());
        match self.strategy {
            StrategyKind::Random => Box::new(RandomStrategy::new(self.seed, bound)),
            StrategyKind::RoundRobin => Box::new(RoundRobinStrategy::new(bound)),
            StrategyKind::Dfs => Box::new(DfsStrategy::new(bound)),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
