//! Experiment configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use mailbench_core::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};

fn default_workdir() -> PathBuf {
    PathBuf::from("/tmp/mailbench/out")
}

fn default_seq() -> String {
    "seq".to_string()
}

fn default_instances() -> usize {
    1
}

fn default_ready_timeout() -> u64 {
    5
}

/// Static configuration consumed before `run()`.
///
/// All knobs of one experiment: the host, the filesystem and CPU restriction
/// to run under, the daemon to start, and the load to drive against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Identity of the benchmark host.
    pub host: String,

    /// Directory for run log artifacts on the host.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Directory of host-side helper programs (set-cpus, cpu-sequences,
    /// cleanfs, prefetch, mon-runner, mon-times, mon-wrap).
    pub tools_dir: PathBuf,

    /// Benchmark payload root (daemon builds, mkconfig, run-smtpbm).
    pub bench_root: PathBuf,

    /// Filesystem type to run on, mounted at /tmp/mailbench/<fs>.
    pub fs: String,

    /// Whether CPU hotplug control is available on the host.
    #[serde(default)]
    pub hotplug: bool,

    /// Number of CPUs to restrict the host to.
    pub cores: usize,

    /// Named CPU ordering to draw cores from.
    #[serde(default = "default_seq")]
    pub seq: String,

    /// Number of trials; the best result is kept.
    pub trials: usize,

    /// Load-generator client count per trial.
    pub clients: usize,

    /// Base SMTP port; instance i listens on port + i.
    pub port: u16,

    /// Number of daemon instances.
    #[serde(default = "default_instances")]
    pub instances: usize,

    /// Daemon build directory name under bench_root, suffixed per instance.
    pub daemon_build: String,

    /// Readiness wait bound, in seconds.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl BenchConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Validate the configuration before any task starts.
    pub fn validate(&self) -> BenchResult<()> {
        if !self.hotplug {
            return Err(BenchError::Precondition(
                "the mail benchmark requires hotplug = true; either enable hotplug \
                 or disable the benchmark in the configuration"
                    .to_string(),
            ));
        }
        if self.cores == 0 {
            return Err(BenchError::Config("cores must be at least 1".to_string()));
        }
        if self.trials == 0 {
            return Err(BenchError::Config("trials must be at least 1".to_string()));
        }
        if self.clients == 0 {
            return Err(BenchError::Config("clients must be at least 1".to_string()));
        }
        if self.instances == 0 {
            return Err(BenchError::Config(
                "instances must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
