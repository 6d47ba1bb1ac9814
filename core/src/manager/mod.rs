//! Ordered task registration and lifecycle driving
//!
//! The manager owns the task list for one run. Start order is
//! caller-specified and significant (the server must be confirmed ready
//! before any load generator starts); stop and reset run in reverse order.
//! There is no retrying and no partial-success continuation: the first
//! failure resets every task that reached `start()` and ends the run.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mailbench_remote::HostId;

use crate::cpu::CpuControl;
use crate::error::BenchResult;
use crate::results::Measurement;
use crate::task::{Task, TaskState};

/// Shared state threaded through every lifecycle call.
///
/// Owns the per-host resource caches the original ambient globals became:
/// the CPU control sessions and the prefetch guard set. Also decides where
/// run log artifacts live on the hosts.
pub struct RunContext {
    workdir: PathBuf,
    pub(crate) cpu_cache: tokio::sync::Mutex<HashMap<HostId, CpuControl>>,
    pub(crate) prefetched: tokio::sync::Mutex<HashSet<(HostId, PathBuf)>>,
}

impl RunContext {
    /// Create a context writing run artifacts under `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            cpu_cache: tokio::sync::Mutex::new(HashMap::new()),
            prefetched: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Directory for run log artifacts on the hosts.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Log artifact path for a named component on a host.
    pub fn log_path(&self, host: &HostId, name: &str) -> PathBuf {
        self.workdir.join(format!("{host}.{name}.log"))
    }

    /// Close any CPU control session the reset passes missed. Runs on every
    /// exit path of [`Manager::run`], so the hosts always end the run with
    /// their full CPU sets restored.
    pub(crate) async fn release_all(&self) {
        let leftover: Vec<(HostId, CpuControl)> =
            self.cpu_cache.lock().await.drain().collect();
        for (host, control) in leftover {
            tracing::debug!(host = %host, "releasing CPU control session");
            let mut session = control.session;
            let released = async {
                session.close_stdin().await?;
                session.wait().await
            }
            .await;
            if let Err(error) = released {
                tracing::warn!(host = %host, error = %error, "failed to release CPU control session");
            }
        }
    }
}

struct Entry {
    task: Arc<dyn Task>,
    state: TaskState,
}

/// Drives an ordered list of tasks through one experiment.
pub struct Manager {
    tasks: Vec<Entry>,
    ctx: RunContext,
}

impl Manager {
    /// Create a manager over the given context.
    pub fn new(ctx: RunContext) -> Self {
        Self {
            tasks: Vec::new(),
            ctx,
        }
    }

    /// Register a task. Registration order is start order.
    pub fn add(&mut self, task: Arc<dyn Task>) {
        self.tasks.push(Entry {
            task,
            state: TaskState::Unstarted,
        });
    }

    /// The shared run context.
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Measurements from results-providing tasks, in registration order.
    pub fn results(&self) -> Vec<(String, Measurement)> {
        self.tasks
            .iter()
            .filter_map(|entry| {
                entry
                    .task
                    .as_results()
                    .and_then(|provider| provider.result())
                    .map(|measurement| (entry.task.name().to_string(), measurement))
            })
            .collect()
    }

    /// Execute the entire experiment once: start-all, wait-all, then
    /// stop-all and reset-all in reverse order.
    ///
    /// On any failure, every task that reached `start()` is reset in
    /// reverse order before the error is returned. Shared resources are
    /// released on every exit path.
    pub async fn run(&mut self) -> BenchResult<()> {
        let outcome = self.run_inner().await;
        if let Err(error) = &outcome {
            tracing::error!(error = %error, "run failed; resetting started tasks");
            self.reset_started().await;
        }
        self.ctx.release_all().await;
        outcome
    }

    async fn run_inner(&mut self) -> BenchResult<()> {
        for entry in &mut self.tasks {
            tracing::info!(
                task = entry.task.name(),
                host = %entry.task.host(),
                params = ?entry.task.params(),
                "starting"
            );
            // Marked before the call: an abort mid-start still resets this task.
            entry.state = TaskState::Running;
            entry.task.start(&self.ctx).await?;
        }

        for entry in &self.tasks {
            entry.task.wait(&self.ctx).await?;
        }

        for entry in self.tasks.iter_mut().rev() {
            tracing::info!(task = entry.task.name(), "stopping");
            entry.task.stop(&self.ctx).await?;
            entry.state = TaskState::Stopped;
        }

        // Reset in reverse as well; this is what restores shared host state
        // (the full CPU set) on the success path.
        for entry in self.tasks.iter_mut().rev() {
            entry.task.reset(&self.ctx).await?;
        }
        Ok(())
    }

    async fn reset_started(&mut self) {
        for entry in self.tasks.iter_mut().rev() {
            if entry.state == TaskState::Unstarted {
                continue;
            }
            if let Err(error) = entry.task.reset(&self.ctx).await {
                tracing::warn!(task = entry.task.name(), error = %error, "reset failed");
            }
            entry.state = TaskState::Stopped;
        }
    }
}
