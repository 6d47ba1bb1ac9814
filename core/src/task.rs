//! Task lifecycle contract

use async_trait::async_trait;
use mailbench_remote::HostId;

use crate::error::BenchResult;
use crate::manager::RunContext;
use crate::results::ResultsProvider;

/// Lifecycle state of a registered task, tracked by the
/// [`Manager`](crate::Manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// `start()` has not been attempted.
    #[default]
    Unstarted,
    /// `start()` was attempted; the task may hold live processes.
    Running,
    /// The task was stopped or reset.
    Stopped,
}

/// The unit of orchestration.
///
/// A task brings remote processes or host state into a running condition,
/// optionally performs a measured wait phase, and tears itself down. Tasks
/// are registered with a [`Manager`](crate::Manager) and driven in
/// registration order for start/wait and reverse order for stop/reset.
///
/// Operations take `&self`; implementations keep live process handles behind
/// a mutex. All lifecycle calls originate from the manager's single control
/// flow, so the mutexes provide interior mutability, not contention safety.
#[async_trait]
pub trait Task: Send + Sync {
    /// Short name used in logs and log artifact paths.
    fn name(&self) -> &str;

    /// Host this task operates on.
    fn host(&self) -> &HostId;

    /// Ordered identifying configuration fields, for run labeling.
    fn params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Bring the task's remote processes or host state into the running
    /// condition. Called exactly once per run; any failure aborts the entire
    /// run with no partial-success continuation.
    async fn start(&self, ctx: &RunContext) -> BenchResult<()>;

    /// The measured phase, driven after every registered task has started.
    /// Default no-op.
    async fn wait(&self, _ctx: &RunContext) -> BenchResult<()> {
        Ok(())
    }

    /// Normal shutdown path, invoked in reverse registration order after the
    /// measured portion completes. Default no-op.
    async fn stop(&self, _ctx: &RunContext) -> BenchResult<()> {
        Ok(())
    }

    /// Idempotent cleanup, invoked regardless of whether `start()` fully
    /// succeeded. Must be safe on a task that never started and must never
    /// fail on an already-stopped task. Default no-op.
    async fn reset(&self, _ctx: &RunContext) -> BenchResult<()> {
        Ok(())
    }

    /// Access this task's measured outcome, if it produces one.
    fn as_results(&self) -> Option<&dyn ResultsProvider> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert {
        host: HostId,
    }

    #[async_trait]
    impl Task for Inert {
        fn name(&self) -> &str {
            "inert"
        }

        fn host(&self) -> &HostId {
            &self.host
        }

        async fn start(&self, _ctx: &RunContext) -> BenchResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_task_state_default() {
        assert_eq!(TaskState::default(), TaskState::Unstarted);
    }

    #[tokio::test]
    async fn test_default_lifecycle_methods_are_noops() {
        let task = Inert {
            host: HostId::new("h"),
        };
        let ctx = RunContext::new("/tmp/out");

        task.start(&ctx).await.unwrap();
        task.wait(&ctx).await.unwrap();
        task.stop(&ctx).await.unwrap();
        task.reset(&ctx).await.unwrap();

        assert!(task.params().is_empty());
        assert!(task.as_results().is_none());
    }
}
