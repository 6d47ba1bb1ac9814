//! Mail daemon and load-generation tasks
//!
//! The benchmark payload: a daemon started once per instance with a
//! generated configuration, and a load trial that drives SMTP clients
//! against it under the system monitor.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mailbench_core::{
    extract_message_count, wait_for_log, BenchResult, Measurement, RunContext, SystemMonitor,
    Task, Trial, TIME_REAL,
};
use mailbench_remote::{CommandSpec, Executor, HostId, OutputSink, ProcessHandle, Signal};

const READY_SENTINEL: &str = "listening for SMTP";
const START_MARKER: &str = "Starting";
const STOP_MARKER: &str = "Stopped";

fn indexed(base: &str, i: usize) -> String {
    format!("{base}-{i}")
}

/// Starts N mail daemon instances, each with its own generated
/// configuration, mail directory, spool, and port.
pub struct MailDaemon {
    exec: Arc<dyn Executor>,
    bench_root: PathBuf,
    build: String,
    mail_dir: String,
    spool_dir: String,
    port: u16,
    instances: usize,
    ready_timeout_secs: u64,
    procs: tokio::sync::Mutex<Vec<Box<dyn ProcessHandle>>>,
}

impl MailDaemon {
    /// Instance `i` uses `<build>-<i>` under `bench_root`, `<mail_dir>-<i>`,
    /// `<spool_dir>-<i>`, and `port + i`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exec: Arc<dyn Executor>,
        bench_root: impl Into<PathBuf>,
        build: impl Into<String>,
        mail_dir: impl Into<String>,
        spool_dir: impl Into<String>,
        port: u16,
        instances: usize,
    ) -> Self {
        Self {
            exec,
            bench_root: bench_root.into(),
            build: build.into(),
            mail_dir: mail_dir.into(),
            spool_dir: spool_dir.into(),
            port,
            instances,
            ready_timeout_secs: 5,
            procs: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Adjust how long each instance may take to signal readiness.
    pub fn with_ready_timeout(mut self, secs: u64) -> Self {
        self.ready_timeout_secs = secs;
        self
    }

    async fn start_instance(&self, ctx: &RunContext, i: usize) -> BenchResult<()> {
        let build = self.bench_root.join(indexed(&self.build, i));

        // Generate this instance's configuration.
        let config = ctx
            .workdir()
            .join(format!("{}.maild-{i}.conf", self.exec.host()));
        self.exec
            .run(
                &CommandSpec::new(self.bench_root.join("mkconfig").display().to_string())
                    .arg(build.display().to_string())
                    .arg(indexed(&self.mail_dir, i))
                    .arg(indexed(&self.spool_dir, i))
                    .stdout(OutputSink::File(config.clone())),
            )
            .await?;

        // Start the daemon in the foreground on its own port.
        let proc = self
            .exec
            .spawn(
                &CommandSpec::new(build.join("bin/maild").display().to_string())
                    .arg("-bdf")
                    .arg("-oX")
                    .arg((self.port + i as u16).to_string())
                    .arg("-C")
                    .arg(config.display().to_string()),
            )
            .await?;
        self.procs.lock().await.push(proc);

        let mainlog = PathBuf::from(indexed(&self.spool_dir, i)).join("log/mainlog");
        wait_for_log(
            self.exec.as_ref(),
            &mainlog,
            "maild",
            self.ready_timeout_secs,
            READY_SENTINEL,
        )
        .await
    }
}

#[async_trait]
impl Task for MailDaemon {
    fn name(&self) -> &str {
        "maild"
    }

    fn host(&self) -> &HostId {
        self.exec.host()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.exec.host().to_string()),
            ("port", self.port.to_string()),
            ("instances", self.instances.to_string()),
        ]
    }

    async fn start(&self, ctx: &RunContext) -> BenchResult<()> {
        for i in 0..self.instances {
            self.start_instance(ctx, i).await?;
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &RunContext) -> BenchResult<()> {
        // There is no clean way to shut the daemon down, so the exit status
        // is not checked.
        for proc in self.procs.lock().await.iter_mut() {
            let _ = proc.signal(Signal::Term).await;
        }
        Ok(())
    }

    async fn reset(&self, ctx: &RunContext) -> BenchResult<()> {
        let has_procs = !self.procs.lock().await.is_empty();
        if has_procs {
            self.stop(ctx).await?;
        }
        Ok(())
    }
}

/// One load-generation trial: drive SMTP clients against the daemon under
/// the system monitor and extract the delivered-message count.
pub struct MailLoad {
    exec: Arc<dyn Executor>,
    bench_root: PathBuf,
    clients: usize,
    port: u16,
    sysmon: Arc<SystemMonitor>,
}

impl MailLoad {
    /// Drive `clients` concurrent clients against `port`.
    pub fn new(
        exec: Arc<dyn Executor>,
        bench_root: impl Into<PathBuf>,
        clients: usize,
        port: u16,
        sysmon: Arc<SystemMonitor>,
    ) -> Self {
        Self {
            exec,
            bench_root: bench_root.into(),
            clients,
            port,
            sysmon,
        }
    }
}

#[async_trait]
impl Trial for MailLoad {
    async fn run_trial(&self, ctx: &RunContext, trial: usize) -> BenchResult<Measurement> {
        let log = ctx.log_path(self.exec.host(), &format!("load-{trial}"));

        let cmd = CommandSpec::new(self.bench_root.join("run-smtpbm").display().to_string())
            .arg(self.clients.to_string())
            .arg(self.port.to_string());
        let cmd = self
            .sysmon
            .wrap(&cmd, START_MARKER, STOP_MARKER)
            .stdout(OutputSink::File(log.clone()));
        self.exec.run(&cmd).await?;

        let output = self.exec.read_file(&log).await?;
        let metrics = self.sysmon.parse_log(&output)?;
        let count = extract_message_count(&output)?;
        if let Some(elapsed) = metrics.get(TIME_REAL) {
            tracing::debug!(messages = count, elapsed, "trial measured");
        }
        Ok(Measurement::new(count as f64, "messages"))
    }
}
