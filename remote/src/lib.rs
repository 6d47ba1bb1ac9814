//! mailbench-remote: Command execution transport for benchmark hosts
//!
//! This crate is the seam between the orchestration core and the machines it
//! drives. It provides:
//!
//! - The [`Executor`] trait: run a command on a host, blocking or
//!   fire-and-forget, optionally privileged, with stdin/stdout redirection,
//!   and read text files back.
//! - The [`ProcessHandle`] trait: control a spawned process (signal, wait,
//!   close stdin).
//! - [`LocalExecutor`]: a concrete implementation backed by `tokio::process`
//!   for running benchmarks on the local machine.
//!
//! The orchestration core only ever sees `Arc<dyn Executor>`; transports for
//! other hosts (SSH, an agent, a container runtime) implement the same trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod executor;
pub mod host;
pub mod local;

pub use command::{CommandOutput, CommandSpec, OutputSink, StdinSource};
pub use error::{ExecError, ExecResult};
pub use executor::{Executor, ProcessHandle, Signal};
pub use host::HostId;
pub use local::LocalExecutor;
