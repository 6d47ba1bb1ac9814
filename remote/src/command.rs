//! Command descriptions for execution on a host

use std::fmt;
use std::path::PathBuf;

/// Where a command's stdin comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StdinSource {
    /// No input; the command sees EOF immediately.
    #[default]
    Null,
    /// Keep stdin open as a pipe, closed later through the process handle.
    Piped,
    /// Redirect stdin from a file on the host.
    File(PathBuf),
}

/// Where a command's stdout goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputSink {
    /// Capture into the returned [`CommandOutput`].
    #[default]
    Capture,
    /// Redirect to a file on the host, created or truncated.
    File(PathBuf),
    /// Discard.
    Discard,
}

/// A command to run on a host.
///
/// Built incrementally:
///
/// ```
/// use mailbench_remote::{CommandSpec, StdinSource};
///
/// let spec = CommandSpec::new("set-cpus")
///     .arg("-i")
///     .privileged()
///     .stdin(StdinSource::Piped);
/// assert!(spec.privileged);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program path or name, resolved on the target host.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Run with privilege escalation on the host.
    pub privileged: bool,
    /// Stdin redirection.
    pub stdin: StdinSource,
    /// Stdout redirection.
    pub stdout: OutputSink,
}

impl CommandSpec {
    /// Create a command for the given program with default redirections.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
            stdin: StdinSource::default(),
            stdout: OutputSink::default(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Request privilege escalation.
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Set the stdin redirection.
    pub fn stdin(mut self, source: StdinSource) -> Self {
        self.stdin = source;
        self
    }

    /// Set the stdout redirection.
    pub fn stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = sink;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, when the OS reported one; `None` means killed by a signal.
    pub status: Option<i32>,
    /// Captured stdout; empty unless the command ran with
    /// [`OutputSink::Capture`].
    pub stdout: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}
