//! Error taxonomy for the orchestration core

use mailbench_remote::ExecError;
use thiserror::Error;

/// Orchestration failures.
///
/// No operation retries automatically; every failure propagates to the
/// [`Manager`](crate::Manager), which resets started tasks in reverse order
/// and surfaces the error.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A required external condition is absent (filesystem not mounted,
    /// hotplug disabled in configuration). Aborts before any task starts.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A dependency failed to signal readiness within its bound.
    #[error("timeout waiting for {component} to start")]
    StartupTimeout {
        /// Component that never became ready.
        component: String,
    },

    /// The requested CPU sequence name is not defined on the host.
    #[error("unknown CPU sequence {name:?}")]
    UnknownSequence {
        /// Requested sequence name.
        name: String,
    },

    /// The requested CPU count exceeds the sequence length.
    #[error("requested {requested} cores, but only {available} are available")]
    InsufficientCapacity {
        /// Cores requested.
        requested: usize,
        /// Cores the sequence contains.
        available: usize,
    },

    /// Trials reported incomparable units.
    #[error("units changed between trials: expected {expected:?}, got {actual:?}")]
    InconsistentUnits {
        /// Unit adopted from the first trial.
        expected: String,
        /// Unit the offending trial reported.
        actual: String,
    },

    /// The monitor produced no parsable samples; the wrapped benchmark never
    /// ran inside the monitoring window.
    #[error("benchmark did not start or did not stop the monitor")]
    EmptyMonitorOutput,

    /// A required metric key is absent from monitor output.
    #[error("monitor output is missing the {key:?} metric")]
    MissingMetric {
        /// Metric key that was expected.
        key: String,
    },

    /// Result extraction found the wrong number of result lines.
    #[error("expected 1 message count in log, got {count}")]
    UnexpectedResultCount {
        /// Number of result lines found.
        count: usize,
    },

    /// Transport-level failure.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Invalid configuration or malformed host output.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for orchestration operations.
pub type BenchResult<T> = std::result::Result<T, BenchError>;
