//! Filesystem preconditions and one-time data priming

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mailbench_remote::{CommandSpec, Executor, HostId, StdinSource};

use crate::error::{BenchError, BenchResult};
use crate::manager::RunContext;
use crate::task::Task;

/// Benchmark scratch root on each host; one mount point per filesystem type.
const MOUNT_ROOT: &str = "/tmp/mailbench";
const CLEANFS: &str = "cleanfs";
const PREFETCH: &str = "prefetch";

/// Verifies the benchmark filesystem is mounted and optionally cleans it.
///
/// The check reads the mount table instead of probing the directory, so a
/// stale mount-point directory does not satisfy it.
pub struct FileSystem {
    exec: Arc<dyn Executor>,
    tools_dir: PathBuf,
    fstype: String,
    clean: bool,
}

impl FileSystem {
    /// Expect `/tmp/mailbench/<fstype>/` to be mounted on the executor's
    /// host, cleaning it at start. Helper programs are resolved against
    /// `tools_dir`.
    pub fn new(exec: Arc<dyn Executor>, tools_dir: impl Into<PathBuf>, fstype: impl Into<String>) -> Self {
        Self {
            exec,
            tools_dir: tools_dir.into(),
            fstype: fstype.into(),
            clean: true,
        }
    }

    /// Skip the cleaning step.
    pub fn without_clean(mut self) -> Self {
        self.clean = false;
        self
    }

    /// Scratch path for this filesystem type, with trailing slash.
    pub fn path(&self) -> String {
        format!("{MOUNT_ROOT}/{}/", self.fstype)
    }
}

#[async_trait]
impl Task for FileSystem {
    fn name(&self) -> &str {
        "fs"
    }

    fn host(&self) -> &HostId {
        self.exec.host()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.exec.host().to_string()),
            ("fstype", self.fstype.clone()),
        ]
    }

    async fn start(&self, _ctx: &RunContext) -> BenchResult<()> {
        if self.fstype.contains('/') {
            return Err(BenchError::Config(format!(
                "filesystem type {:?} must not contain '/'",
                self.fstype
            )));
        }

        let path = self.path();
        let mount_check = path.trim_end_matches('/');
        let mounts = self.exec.read_file(Path::new("/proc/self/mounts")).await?;
        let mounted = mounts.lines().any(|line| {
            line.split_whitespace()
                .nth(1)
                .is_some_and(|mount_point| mount_point.starts_with(mount_check))
        });
        if !mounted {
            return Err(BenchError::Precondition(format!(
                "no file system mounted at {mount_check}; run 'mkmounts {}' on {}",
                self.fstype,
                self.exec.host()
            )));
        }

        if self.clean {
            self.exec
                .run(
                    &CommandSpec::new(self.tools_dir.join(CLEANFS).display().to_string())
                        .arg(&self.fstype),
                )
                .await?;
        }
        Ok(())
    }
}

/// Primes a host's page cache from a file list, at most once per
/// `(host, files_path)` pair when reuse is requested.
pub struct PrefetchList {
    exec: Arc<dyn Executor>,
    tools_dir: PathBuf,
    files_path: PathBuf,
    reuse: bool,
}

impl PrefetchList {
    /// Prefetch every file named in `files_path` (one path per line).
    pub fn new(
        exec: Arc<dyn Executor>,
        tools_dir: impl Into<PathBuf>,
        files_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exec,
            tools_dir: tools_dir.into(),
            files_path: files_path.into(),
            reuse: false,
        }
    }

    /// Skip priming when another task already primed this list on this host
    /// during the current run.
    pub fn with_reuse(mut self) -> Self {
        self.reuse = true;
        self
    }
}

#[async_trait]
impl Task for PrefetchList {
    fn name(&self) -> &str {
        "prefetch"
    }

    fn host(&self) -> &HostId {
        self.exec.host()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.exec.host().to_string()),
            ("files", self.files_path.display().to_string()),
        ]
    }

    async fn start(&self, ctx: &RunContext) -> BenchResult<()> {
        if self.reuse {
            let key = (self.exec.host().clone(), self.files_path.clone());
            let mut primed = ctx.prefetched.lock().await;
            if !primed.insert(key) {
                tracing::debug!(
                    host = %self.exec.host(),
                    files = %self.files_path.display(),
                    "already primed"
                );
                return Ok(());
            }
        }

        self.exec
            .run(
                &CommandSpec::new(self.tools_dir.join(PREFETCH).display().to_string())
                    .arg("-l")
                    .stdin(StdinSource::File(self.files_path.clone())),
            )
            .await?;
        Ok(())
    }
}
