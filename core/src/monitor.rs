//! System monitoring bracketed by output markers
//!
//! The monitor runner samples system state between a start marker and a stop
//! marker appearing in the wrapped command's own output stream. The
//! orchestrator produces the wrapped command line; the runner consumes the
//! markers; harvesting happens at stop time by interrupting the runner and
//! parsing its report.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mailbench_remote::{CommandSpec, Executor, HostId, OutputSink, ProcessHandle, Signal};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BenchError, BenchResult};
use crate::manager::RunContext;
use crate::readiness::wait_for_log;
use crate::task::Task;

/// Fixed key of the wall-clock elapsed-time metric.
pub const TIME_REAL: &str = "time.real";

const MON_RUNNER: &str = "mon-runner";
const MON_TIMES: &str = "mon-times";
const MON_WRAP: &str = "mon-wrap";
const READY_SENTINEL: &str = "mon-runner ready";

// Metric names are dotted (`time.real`, `cpu.user`), which keeps benchmark
// chatter like "1234 messages delivered" out of the metric map.
static METRIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([A-Za-z][\w-]*(?:\.[\w-]+)+)[ \t]+(-?[0-9]+(?:\.[0-9]+)?)[ \t]*$")
        .expect("valid regex")
});

#[derive(Default)]
struct MonitorState {
    proc: Option<Box<dyn ProcessHandle>>,
    samples: Option<HashMap<String, f64>>,
}

/// Samples system metrics while a wrapped benchmark command runs.
///
/// `start` launches the monitor runner and waits for it to come up; `wrap`
/// brackets a command with the marker pair the runner watches for; `stop`
/// interrupts the runner and harvests its report.
pub struct SystemMonitor {
    exec: Arc<dyn Executor>,
    tools_dir: PathBuf,
    ready_timeout_secs: u64,
    state: tokio::sync::Mutex<MonitorState>,
}

impl SystemMonitor {
    /// Create a monitor for the executor's host. Helper programs are
    /// resolved against `tools_dir`.
    pub fn new(exec: Arc<dyn Executor>, tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            exec,
            tools_dir: tools_dir.into(),
            ready_timeout_secs: 5,
            state: tokio::sync::Mutex::new(MonitorState::default()),
        }
    }

    /// Adjust how long `start` waits for the runner to come up.
    pub fn with_ready_timeout(mut self, secs: u64) -> Self {
        self.ready_timeout_secs = secs;
        self
    }

    fn tool(&self, name: &str) -> String {
        self.tools_dir.join(name).display().to_string()
    }

    /// Bracket `spec` with the monitor wrapper so sampling starts when
    /// `start_marker` appears in the command's output and stops at
    /// `stop_marker`. The original redirections and privilege carry over.
    pub fn wrap(&self, spec: &CommandSpec, start_marker: &str, stop_marker: &str) -> CommandSpec {
        let mut wrapped = CommandSpec::new(self.tool(MON_WRAP))
            .arg(start_marker)
            .arg(stop_marker)
            .arg(spec.program.as_str());
        wrapped.args.extend(spec.args.iter().cloned());
        wrapped.privileged = spec.privileged;
        wrapped.stdin = spec.stdin.clone();
        wrapped.stdout = spec.stdout.clone();
        wrapped
    }

    /// Extract the sampling report embedded in a wrapped command's output.
    ///
    /// # Errors
    ///
    /// [`BenchError::MissingMetric`] if the [`TIME_REAL`] key is absent,
    /// meaning the wrapped workload never ran inside the monitoring window.
    pub fn parse_log(&self, output: &str) -> BenchResult<HashMap<String, f64>> {
        let mut metrics = HashMap::new();
        for caps in METRIC_LINE.captures_iter(output) {
            if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
                if let Ok(value) = value.as_str().parse::<f64>() {
                    metrics.insert(name.as_str().to_string(), value);
                }
            }
        }
        if !metrics.contains_key(TIME_REAL) {
            return Err(BenchError::MissingMetric {
                key: TIME_REAL.to_string(),
            });
        }
        Ok(metrics)
    }

    /// Parse the runner's own report: a banner line followed by
    /// `<name> <value>` sample lines.
    fn parse_report(log: &str) -> BenchResult<HashMap<String, f64>> {
        let mut samples = HashMap::new();
        for line in log.lines().skip(1) {
            let mut fields = line.split_whitespace();
            if let (Some(name), Some(value), None) = (fields.next(), fields.next(), fields.next())
            {
                if let Ok(value) = value.parse::<f64>() {
                    samples.insert(name.to_string(), value);
                }
            }
        }
        if samples.is_empty() {
            return Err(BenchError::EmptyMonitorOutput);
        }
        Ok(samples)
    }

    /// Samples harvested by `stop`, if the monitor ran to completion.
    pub async fn samples(&self) -> Option<HashMap<String, f64>> {
        self.state.lock().await.samples.clone()
    }
}

#[async_trait]
impl Task for SystemMonitor {
    fn name(&self) -> &str {
        "sysmon"
    }

    fn host(&self) -> &HostId {
        self.exec.host()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![("host", self.exec.host().to_string())]
    }

    async fn start(&self, ctx: &RunContext) -> BenchResult<()> {
        let log = ctx.log_path(self.exec.host(), self.name());
        let proc = self
            .exec
            .spawn(
                &CommandSpec::new(self.tool(MON_RUNNER))
                    .arg(self.tool(MON_TIMES))
                    .stdout(OutputSink::File(log.clone())),
            )
            .await?;
        self.state.lock().await.proc = Some(proc);

        wait_for_log(
            self.exec.as_ref(),
            &log,
            MON_RUNNER,
            self.ready_timeout_secs,
            READY_SENTINEL,
        )
        .await
    }

    async fn stop(&self, ctx: &RunContext) -> BenchResult<()> {
        let mut state = self.state.lock().await;
        let Some(mut proc) = state.proc.take() else {
            return Ok(());
        };

        proc.signal(Signal::Int).await?;
        proc.wait().await?;

        let log = ctx.log_path(self.exec.host(), self.name());
        let report = self.exec.read_file(&log).await?;
        let samples = Self::parse_report(&report)?;
        tracing::debug!(host = %self.exec.host(), samples = samples.len(), "harvested monitor samples");
        state.samples = Some(samples);
        Ok(())
    }

    async fn reset(&self, _ctx: &RunContext) -> BenchResult<()> {
        // No harvest on the abort path; just make sure the runner is gone.
        let Some(mut proc) = self.state.lock().await.proc.take() else {
            return Ok(());
        };
        let _ = proc.signal(Signal::Term).await;
        let _ = proc.wait().await;
        Ok(())
    }
}
