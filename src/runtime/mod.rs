//! Cooperative scheduling runtime.
//!
//! - [`entity`]: Per-actor schedulable entity records
//! - [`scheduler`]: The controlled cooperative scheduler
//! - [`config`]: Scheduler configuration and strategy selection
//! - [`env_config`]: `COOPSCHED_*` environment and TOML overrides
//! - [`report`]: Bug reports and iteration statistics
//! - [`state_cache`]: Program-state fingerprints for revisit counting
//!
//! # Quick Start
//!
//! ```ignore
//! use coopsched::runtime::{Scheduler, SchedulerConfig};
//!
//! let config = SchedulerConfig::new(42).max_fair_steps(1_000);
//! let scheduler = Scheduler::new(config, config.build_strategy());
//! // hand clones to workers, then:
//! scheduler.wait();
//! let report = scheduler.report();
//! ```

pub mod config;
pub mod entity;
pub mod env_config;
pub mod report;
pub mod scheduler;
pub mod state_cache;

pub use config::{ReplayMismatchPolicy, SchedulerConfig, StrategyKind};
pub use entity::SchedulableEntity;
pub use report::{BugKind, BugReport, Termination, TestReport};
pub use scheduler::Scheduler;
pub use state_cache::StateCache;
