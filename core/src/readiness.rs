//! Log-polling readiness synchronization
//!
//! Asynchronously-launched remote processes signal readiness by appending to
//! a log file; the transport offers no synchronous readiness callback. A
//! fixed sleep would under- or over-shoot depending on host load, so
//! readiness is detected by bounded polling instead.

use std::path::Path;
use std::time::Duration;

use mailbench_remote::Executor;

use crate::error::{BenchError, BenchResult};

/// Interval between readiness polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll a log file on the host until it contains `sentinel`.
///
/// Makes at most `timeout_secs * 2` read attempts, sleeping
/// [`POLL_INTERVAL`] between them, and returns the first time the log
/// content contains `sentinel`. A log that cannot be read yet counts as not
/// ready rather than failing the wait; started daemons create their logs
/// asynchronously.
///
/// # Errors
///
/// [`BenchError::StartupTimeout`] naming `name` if the sentinel never
/// appears within the attempt budget.
pub async fn wait_for_log(
    exec: &dyn Executor,
    log_path: &Path,
    name: &str,
    timeout_secs: u64,
    sentinel: &str,
) -> BenchResult<()> {
    let attempts = timeout_secs * 2;
    for attempt in 0..attempts {
        let log = exec.read_file(log_path).await.unwrap_or_default();
        if log.contains(sentinel) {
            tracing::debug!(component = name, attempt, "ready");
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Err(BenchError::StartupTimeout {
        component: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use std::path::PathBuf;

    fn log_path() -> PathBuf {
        PathBuf::from("/var/log/daemon.log")
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_immediately_when_sentinel_present() {
        let exec = MockExecutor::new("h");
        exec.set_file(&log_path(), "booting\nlistening for SMTP\n");

        wait_for_log(&exec, &log_path(), "maild", 5, "listening for SMTP")
            .await
            .unwrap();
        assert_eq!(exec.reads(&log_path()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_once_sentinel_appears() {
        let exec = MockExecutor::new("h");
        // Sentinel shows up on the 4th read, inside the 5s (10 attempt) budget.
        exec.set_file_after(&log_path(), 3, "listening for SMTP\n");

        wait_for_log(&exec, &log_path(), "maild", 5, "listening for SMTP")
            .await
            .unwrap();
        assert_eq!(exec.reads(&log_path()), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exact_attempt_budget() {
        let exec = MockExecutor::new("h");
        // Sentinel would only appear on the 11th read; budget is 5*2 = 10.
        exec.set_file_after(&log_path(), 10, "listening for SMTP\n");

        let err = wait_for_log(&exec, &log_path(), "maild", 5, "listening for SMTP")
            .await
            .unwrap_err();
        match err {
            BenchError::StartupTimeout { component } => assert_eq!(component, "maild"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(exec.reads(&log_path()), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_log_counts_as_not_ready() {
        let exec = MockExecutor::new("h");
        // No file registered at all: every read errors, every attempt is spent.
        let err = wait_for_log(&exec, &log_path(), "mon-runner", 2, "ready")
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::StartupTimeout { .. }));
        assert_eq!(exec.reads(&log_path()), 4);
    }
}
