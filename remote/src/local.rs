//! Local-host executor backed by `tokio::process`

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::command::{CommandOutput, CommandSpec, OutputSink, StdinSource};
use crate::error::{ExecError, ExecResult};
use crate::executor::{Executor, ProcessHandle, Signal};
use crate::host::HostId;

impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Int => libc::SIGINT,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

/// Runs commands as child processes of the orchestrator.
///
/// Privileged commands are prefixed with `sudo` unless the orchestrator
/// already runs as root.
pub struct LocalExecutor {
    host: HostId,
}

impl LocalExecutor {
    /// Create an executor for the local machine under the given identity.
    pub fn new(host: HostId) -> Self {
        Self { host }
    }

    fn build(&self, spec: &CommandSpec) -> ExecResult<Command> {
        let escalate = spec.privileged && unsafe { libc::geteuid() } != 0;
        let mut cmd = if escalate {
            let mut cmd = Command::new("sudo");
            cmd.arg(&spec.program);
            cmd
        } else {
            Command::new(&spec.program)
        };
        cmd.args(&spec.args);

        cmd.stdin(match &spec.stdin {
            StdinSource::Null => Stdio::null(),
            StdinSource::Piped => Stdio::piped(),
            StdinSource::File(path) => {
                let file = std::fs::File::open(path).map_err(|source| ExecError::Redirect {
                    path: path.clone(),
                    source,
                })?;
                Stdio::from(file)
            }
        });
        cmd.stdout(match &spec.stdout {
            OutputSink::Capture => Stdio::piped(),
            OutputSink::File(path) => {
                let file = std::fs::File::create(path).map_err(|source| ExecError::Redirect {
                    path: path.clone(),
                    source,
                })?;
                Stdio::from(file)
            }
            OutputSink::Discard => Stdio::null(),
        });
        cmd.kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    fn host(&self) -> &HostId {
        &self.host
    }

    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        let output = self.run_unchecked(spec).await?;
        match output.status {
            Some(0) => Ok(output),
            Some(code) => Err(ExecError::NonZeroExit {
                program: spec.program.clone(),
                code,
            }),
            None => Err(ExecError::Signaled {
                program: spec.program.clone(),
            }),
        }
    }

    async fn run_unchecked(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        let child = self
            .build(spec)?
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        let output = child.wait_with_output().await?;

        tracing::trace!(host = %self.host, command = %spec, status = ?output.status.code(), "command finished");
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    async fn spawn(&self, spec: &CommandSpec) -> ExecResult<Box<dyn ProcessHandle>> {
        let child = self
            .build(spec)?
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        tracing::debug!(host = %self.host, command = %spec, pid = ?child.id(), "spawned");
        Ok(Box::new(LocalProcess { child }))
    }

    async fn read_file(&self, path: &Path) -> ExecResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ExecError::ReadFile {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Handle to a child process of the orchestrator.
#[derive(Debug)]
pub struct LocalProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for LocalProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn signal(&mut self, signal: Signal) -> ExecResult<()> {
        // Already reaped means already dead; delivery is unconditional.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal.as_raw()) };
        if rc != 0 {
            return Err(ExecError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    async fn close_stdin(&mut self) -> ExecResult<()> {
        // Dropping the pipe writer delivers EOF.
        drop(self.child.stdin.take());
        Ok(())
    }

    async fn wait(&mut self) -> ExecResult<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}
