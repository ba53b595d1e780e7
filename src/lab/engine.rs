//! Iteration engines: systematic testing and bug replay.
//!
//! [`TestingEngine`] runs a harness repeatedly under one strategy, resetting it
//! between iterations, and folds every run into a [`TestReport`].
//! [`ReplayEngine`] runs a harness once under a replay strategy built from a
//! recorded [`ScheduleTrace`] or [`ProgramModel`].

use super::runtime::{ActorContext, IterationOutcome, LabRuntime};
use crate::error::{ReplayError, ScheduleResult};
use crate::model::ProgramModel;
use crate::runtime::{ReplayMismatchPolicy, SchedulerConfig, TestReport};
use crate::strategy::{
    GraphReplayStrategy, ProgramModelStrategy, ReplayStrategy, SchedulingStrategy,
};
use crate::trace::ScheduleTrace;
use crate::tracing_compat::{debug, info};
use std::sync::Arc;

/// Result of a [`TestingEngine`] run.
#[derive(Debug, Clone, Default)]
pub struct EngineSummary {
    /// Statistics folded over every iteration.
    pub report: TestReport,
    /// Iterations run.
    pub iterations: u64,
    /// Outcome of the first iteration that found a bug.
    pub first_bug: Option<IterationOutcome>,
    /// The strategy had no unexplored schedule left.
    pub exhausted: bool,
}

impl EngineSummary {
    /// Whether any iteration found a bug.
    #[must_use]
    pub fn found_bug(&self) -> bool {
        self.first_bug.is_some()
    }
}

fn recording(
    config: &SchedulerConfig,
    strategy: Box<dyn SchedulingStrategy>,
) -> Box<dyn SchedulingStrategy> {
    if config.record_program_model {
        Box::new(ProgramModelStrategy::new(strategy))
    } else {
        strategy
    }
}

/// Runs a harness for many iterations under one strategy.
#[derive(Debug)]
pub struct TestingEngine {
    config: SchedulerConfig,
    strategy: Option<Box<dyn SchedulingStrategy>>,
}

impl TestingEngine {
    /// Engine using the strategy `config` selects.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let strategy = recording(&config, config.build_strategy());
        Self {
            config,
            strategy: Some(strategy),
        }
    }

    /// Engine driven by `strategy` instead of the configured one.
    #[must_use]
    pub fn with_strategy(config: SchedulerConfig, strategy: Box<dyn SchedulingStrategy>) -> Self {
        let strategy = recording(&config, strategy);
        Self {
            config,
            strategy: Some(strategy),
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs `harness` for the configured number of iterations.
    pub fn run<F>(&mut self, harness: F) -> crate::Result<EngineSummary>
    where
        F: Fn(&ActorContext) -> ScheduleResult<()> + Send + Sync + 'static,
    {
        self.run_each(harness, |_| {})
    }

    /// Like [`run`](Self::run), handing every outcome to `observe`.
    ///
    /// Zero configured iterations means "until the strategy is exhausted".
    pub fn run_each<F, O>(&mut self, harness: F, mut observe: O) -> crate::Result<EngineSummary>
    where
        F: Fn(&ActorContext) -> ScheduleResult<()> + Send + Sync + 'static,
        O: FnMut(&IterationOutcome),
    {
        let runtime = LabRuntime::new(self.config.clone());
        let harness = Arc::new(harness);
        let limit = match self.config.iterations {
            0 => u64::MAX,
            n => n,
        };
        let mut strategy = match self.strategy.take() {
            Some(strategy) => strategy,
            None => recording(&self.config, self.config.build_strategy()),
        };
        info!(
            strategy = %strategy.description(),
            iterations = self.config.iterations,
            "testing started"
        );

        let mut summary = EngineSummary::default();
        for iteration in 0..limit {
            let body = Arc::clone(&harness);
            let (mut outcome, returned) = runtime.run_with(strategy, move |ctx| body(ctx))?;
            strategy = returned;
            outcome.iteration = iteration;
            summary.iterations += 1;
            summary.report.merge(&outcome.report);
            observe(&outcome);
            debug!(
                iteration,
                steps = outcome.steps,
                bug = outcome.found_bug(),
                "iteration finished"
            );

            let found_bug = outcome.found_bug();
            if found_bug && summary.first_bug.is_none() {
                summary.first_bug = Some(outcome);
            }
            if found_bug && self.config.stop_on_first_bug {
                break;
            }
            if !strategy.prepare_for_next_iteration() {
                summary.exhausted = true;
                break;
            }
        }

        info!(
            iterations = summary.iterations,
            bugs = summary.report.bugs_found,
            exhausted = summary.exhausted,
            "testing finished"
        );
        self.strategy = Some(strategy);
        Ok(summary)
    }
}

/// Result of a [`ReplayEngine`] run.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// The replayed run, with a freshly recorded program model.
    pub outcome: IterationOutcome,
    /// Why the replay stopped following its recording, if it did.
    pub error: Option<ReplayError>,
}

/// Reproduces a recorded run.
///
/// Under [`ReplayMismatchPolicy::FallBackToSuffix`] a divergence hands control
/// to the configured exploration strategy; under
/// [`ReplayMismatchPolicy::Fail`] it ends the run with a replay bug.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    config: SchedulerConfig,
}

impl ReplayEngine {
    /// Engine with `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    fn suffix(&self) -> Option<Box<dyn SchedulingStrategy>> {
        match self.config.replay_mismatch {
            ReplayMismatchPolicy::FallBackToSuffix => Some(self.config.build_strategy()),
            ReplayMismatchPolicy::Fail => None,
        }
    }

    /// Replays the decisions of `trace`.
    ///
    /// `fair` must match the recorded run so the same step bound applies.
    pub fn replay_schedule<F>(
        &self,
        trace: &ScheduleTrace,
        fair: bool,
        harness: F,
    ) -> crate::Result<ReplayOutcome>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let mut strategy = ReplayStrategy::new(trace.clone())
            .max_steps(self.config.step_bound(fair))
            .fair(fair)
            .policy(self.config.replay_mismatch);
        if let Some(suffix) = self.suffix() {
            strategy = strategy.suffix(suffix);
        }
        debug!(decisions = trace.len(), fair, "replaying schedule trace");
        self.run(Box::new(strategy), harness)
    }

    /// Replays the step order recorded in `model`.
    pub fn replay_model<F>(
        &self,
        model: &ProgramModel,
        fair: bool,
        harness: F,
    ) -> crate::Result<ReplayOutcome>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let mut strategy = GraphReplayStrategy::new(model.clone(), fair)
            .max_steps(self.config.step_bound(fair))
            .policy(self.config.replay_mismatch);
        if let Some(suffix) = self.suffix() {
            strategy = strategy.suffix(suffix);
        }
        debug!(steps = model.len(), fair, "replaying program model");
        self.run(Box::new(strategy), harness)
    }

    /// Replays `outcome`'s schedule trace.
    pub fn replay_outcome<F>(
        &self,
        outcome: &IterationOutcome,
        harness: F,
    ) -> crate::Result<ReplayOutcome>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        self.replay_schedule(&outcome.schedule_trace, outcome.fair, harness)
    }

    fn run<F>(
        &self,
        strategy: Box<dyn SchedulingStrategy>,
        harness: F,
    ) -> crate::Result<ReplayOutcome>
    where
        F: FnOnce(&ActorContext) -> ScheduleResult<()> + Send + 'static,
    {
        let runtime = LabRuntime::new(self.config.clone());
        let strategy = Box::new(ProgramModelStrategy::new(strategy));
        let (outcome, strategy) = runtime.run_with(strategy, harness)?;
        let error = strategy.replay_error().cloned();
        if let Some(error) = &error {
            info!(%error, "replay diverged");
        }
        Ok(ReplayOutcome { outcome, error })
    }
}
