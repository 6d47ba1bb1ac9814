//! mailbench-core: Task lifecycle and synchronization engine
//!
//! This crate provides the orchestration model used to run distributed
//! benchmarks:
//!
//! - The [`Task`] lifecycle contract (start/wait/stop/reset) and the
//!   [`Manager`] that drives an ordered task list through it
//! - Log-polling readiness synchronization ([`wait_for_log`])
//! - Per-host shared-resource caching and CPU-sequence restriction
//!   ([`SetCpus`])
//! - Filesystem preconditions and one-time data priming ([`FileSystem`],
//!   [`PrefetchList`])
//! - System monitoring bracketed by output markers ([`SystemMonitor`])
//! - Trial repetition with best-result aggregation ([`BenchmarkRunner`],
//!   [`ResultsProvider`])
//!
//! All remote work goes through the `mailbench-remote` [`Executor`] seam;
//! completion is observed only by polling logs and awaiting process exits.
//!
//! [`Executor`]: mailbench_remote::Executor

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cpu;
pub mod error;
pub mod fs;
pub mod manager;
pub mod monitor;
pub mod readiness;
pub mod results;
pub mod runner;
pub mod task;

pub use cpu::SetCpus;
pub use error::{BenchError, BenchResult};
pub use fs::{FileSystem, PrefetchList};
pub use manager::{Manager, RunContext};
pub use monitor::{SystemMonitor, TIME_REAL};
pub use readiness::wait_for_log;
pub use results::{extract_message_count, Measurement, ResultsProvider};
pub use runner::{BenchmarkRunner, Trial};
pub use task::{Task, TaskState};

#[cfg(test)]
pub(crate) mod mock;
