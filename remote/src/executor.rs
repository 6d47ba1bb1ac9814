//! Executor and process-handle traits

use std::path::Path;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandSpec};
use crate::error::ExecResult;
use crate::host::HostId;

/// Signals deliverable to a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM: unconditional termination request.
    Term,
    /// SIGINT: interrupt, used to ask monitors to flush and exit.
    Int,
    /// SIGKILL: last resort.
    Kill,
}

/// Control over a process started with [`Executor::spawn`].
///
/// Signal delivery is unconditional: signaling a process that already exited
/// is a no-op, not an error.
#[async_trait]
pub trait ProcessHandle: Send + std::fmt::Debug {
    /// OS process id, if the process has not been reaped yet.
    fn pid(&self) -> Option<u32>;

    /// Deliver a signal.
    async fn signal(&mut self, signal: Signal) -> ExecResult<()>;

    /// Close the process's stdin, delivering EOF. Safe to call when stdin
    /// was never piped or was already closed.
    async fn close_stdin(&mut self) -> ExecResult<()>;

    /// Wait for the process to exit; returns the exit code when the OS
    /// reported one, `None` when it was killed by a signal.
    async fn wait(&mut self) -> ExecResult<Option<i32>>;
}

/// Runs commands on one host.
///
/// All orchestration components hold this as `Arc<dyn Executor>`; the
/// concrete transport (local process, SSH, agent) is invisible to them.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Identity of the host this executor reaches.
    fn host(&self) -> &HostId;

    /// Run a command to completion. A non-zero exit status is an error.
    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput>;

    /// Run a command to completion, ignoring its exit status.
    async fn run_unchecked(&self, spec: &CommandSpec) -> ExecResult<CommandOutput>;

    /// Start a command without waiting; the returned handle controls it.
    async fn spawn(&self, spec: &CommandSpec) -> ExecResult<Box<dyn ProcessHandle>>;

    /// Read a UTF-8 text file from the host.
    async fn read_file(&self, path: &Path) -> ExecResult<String>;
}
