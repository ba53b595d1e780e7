//! Bug reports and iteration statistics.

use crate::types::EntityId;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BugKind {
    /// A program assertion failed.
    Assertion,
    /// Every remaining entity waits to receive and nothing is enabled.
    Livelock,
    /// A thread outside the scheduler's control reached a scheduling point.
    UncontrolledConcurrency,
    /// The step bound was reached and bound hits are configured as bugs.
    StepBound,
    /// A replay no longer matches its recording and nothing may take over.
    ReplayDivergence,
    /// An actor body panicked.
    Panic,
}

impl BugKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assertion => "assertion",
            Self::Livelock => "livelock",
            Self::UncontrolledConcurrency => "uncontrolled-concurrency",
            Self::StepBound => "step-bound",
            Self::ReplayDivergence => "replay-divergence",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for BugKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first bug found in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    /// Category.
    pub kind: BugKind,
    /// Human-readable description.
    pub message: String,
    /// Description of the strategy that found it.
    pub strategy: String,
    /// Decisions made before the bug was found.
    pub steps: u64,
    /// Entity that was active when the bug was found, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,
}

impl fmt::Display for BugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (strategy {}, {} steps)",
            self.kind, self.message, self.strategy, self.steps
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Nothing was left to schedule.
    Quiescent,
    /// The step bound was reached without being reported as a bug.
    StepBoundReached,
    /// A bug stopped the run.
    BugFound,
}

/// Statistics over one or more runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    /// Number of bugs found.
    pub bugs_found: usize,
    /// The bugs, in the order they were found.
    pub bug_reports: Vec<BugReport>,
    /// Runs driven by a fair strategy.
    pub explored_fair_schedules: u64,
    /// Runs driven by an unfair strategy.
    pub explored_unfair_schedules: u64,
    /// Fair runs that used up the fair step bound.
    pub max_fair_steps_hit_in_fair_tests: u64,
    /// Fair runs that went past the unfair step bound.
    pub max_unfair_steps_hit_in_fair_tests: u64,
    /// Unfair runs that used up the unfair step bound.
    pub max_unfair_steps_hit_in_unfair_tests: u64,
    /// Decisions made across fair runs.
    pub total_explored_fair_steps: u64,
    /// Fewest decisions in a fair run.
    pub min_explored_fair_steps: Option<u64>,
    /// Most decisions in a fair run.
    pub max_explored_fair_steps: u64,
    /// Scheduling points whose state fingerprint had already been seen.
    pub revisited_states: u64,
}

impl TestReport {
    /// Report with no runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any bug was found.
    #[must_use]
    pub fn has_bugs(&self) -> bool {
        self.bugs_found > 0
    }

    /// Total runs covered by the report.
    #[must_use]
    pub const fn explored_schedules(&self) -> u64 {
        self.explored_fair_schedules + self.explored_unfair_schedules
    }

    /// Adds one run's bug to the report.
    pub fn record_bug(&mut self, bug: BugReport) {
        self.bugs_found += 1;
        self.bug_reports.push(bug);
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.bugs_found += other.bugs_found;
        self.bug_reports.extend(other.bug_reports.iter().cloned());
        self.explored_fair_schedules += other.explored_fair_schedules;
        self.explored_unfair_schedules += other.explored_unfair_schedules;
        self.max_fair_steps_hit_in_fair_tests += other.max_fair_steps_hit_in_fair_tests;
        self.max_unfair_steps_hit_in_fair_tests += other.max_unfair_steps_hit_in_fair_tests;
        self.max_unfair_steps_hit_in_unfair_tests += other.max_unfair_steps_hit_in_unfair_tests;
        self.total_explored_fair_steps += other.total_explored_fair_steps;
        self.min_explored_fair_steps =
            match (self.min_explored_fair_steps, other.min_explored_fair_steps) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        self.max_explored_fair_steps = self
            .max_explored_fair_steps
            .max(other.max_explored_fair_steps);
        self.revisited_states += other.revisited_states;
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
