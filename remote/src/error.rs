//! Error types for the execution transport

use std::path::PathBuf;

use thiserror::Error;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A checked command exited with a non-zero status.
    #[error("{program} exited with code {code}")]
    NonZeroExit {
        /// Program that failed.
        program: String,
        /// Exit code.
        code: i32,
    },

    /// A checked command was terminated by a signal.
    #[error("{program} terminated by signal")]
    Signaled {
        /// Program that was terminated.
        program: String,
    },

    /// A redirection target could not be opened.
    #[error("failed to open {path} for redirection: {source}")]
    Redirect {
        /// File that could not be opened.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A host file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure while controlling a process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for transport operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
