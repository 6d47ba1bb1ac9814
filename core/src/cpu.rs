//! CPU-sequence restriction with a per-host shared control session
//!
//! Restricting a host to N cores is cheap, but the setup around it is not:
//! onlining every CPU, querying the host's named CPU orderings, and opening
//! the privileged control session happen once per host per run and are
//! shared by every [`SetCpus`] task through the
//! [`RunContext`](crate::RunContext) cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mailbench_remote::{CommandSpec, Executor, HostId, ProcessHandle, StdinSource};

use crate::error::{BenchError, BenchResult};
use crate::manager::RunContext;
use crate::task::Task;

const SET_CPUS: &str = "set-cpus";
const CPU_SEQUENCES: &str = "cpu-sequences";

/// Provisioned per-host CPU control handle.
///
/// Holds the one long-lived interactive `set-cpus -i` session and the parsed
/// named sequences. The remote-side contract: the session re-onlines every
/// CPU when its stdin reaches EOF, so the host restores itself even if the
/// orchestrator dies and the transport drops the pipe. Orderly teardown
/// closes stdin explicitly and waits for the restore to finish.
pub struct CpuControl {
    pub(crate) session: Box<dyn ProcessHandle>,
    pub(crate) sequences: HashMap<String, Vec<u32>>,
}

/// Parse `cpu-sequences` output: one `<name> <comma-separated ids>` named
/// ordering per line.
fn parse_sequences(output: &str) -> BenchResult<HashMap<String, Vec<u32>>> {
    let mut sequences = HashMap::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, ids) = line
            .split_once(' ')
            .ok_or_else(|| BenchError::Config(format!("malformed CPU sequence line {line:?}")))?;
        let ids = ids
            .split(',')
            .map(|id| {
                id.trim().parse::<u32>().map_err(|_| {
                    BenchError::Config(format!("malformed CPU id {id:?} in sequence {name:?}"))
                })
            })
            .collect::<BenchResult<Vec<u32>>>()?;
        sequences.insert(name.to_string(), ids);
    }
    Ok(sequences)
}

/// Restricts a host to the first N CPUs of a named sequence.
///
/// Multiple `SetCpus` tasks on the same host share one provisioned
/// [`CpuControl`]; the first to start performs setup, later ones observe the
/// cached state. `reset` synchronously restores the full CPU set.
pub struct SetCpus {
    exec: Arc<dyn Executor>,
    tools_dir: PathBuf,
    num: usize,
    seq: String,
}

impl SetCpus {
    /// Restrict the executor's host to `num` cores of the default `"seq"`
    /// ordering. Helper programs are resolved against `tools_dir`.
    pub fn new(exec: Arc<dyn Executor>, tools_dir: impl Into<PathBuf>, num: usize) -> Self {
        Self {
            exec,
            tools_dir: tools_dir.into(),
            num,
            seq: "seq".to_string(),
        }
    }

    /// Use a different named CPU ordering.
    pub fn with_sequence(mut self, name: impl Into<String>) -> Self {
        self.seq = name.into();
        self
    }

    fn tool(&self, name: &str) -> String {
        self.tools_dir.join(name).display().to_string()
    }

    /// One-time per-host setup: online every CPU, learn the named
    /// sequences, and open the long-lived restore-all session.
    async fn provision(&self) -> BenchResult<CpuControl> {
        // Stdin is closed, so interactive mode onlines everything and exits.
        self.exec
            .run(&CommandSpec::new(self.tool(SET_CPUS)).arg("-i").privileged())
            .await?;

        let output = self
            .exec
            .run(&CommandSpec::new(self.tool(CPU_SEQUENCES)))
            .await?;
        let sequences = parse_sequences(&output.stdout)?;

        let session = self
            .exec
            .spawn(
                &CommandSpec::new(self.tool(SET_CPUS))
                    .arg("-i")
                    .privileged()
                    .stdin(StdinSource::Piped),
            )
            .await?;

        tracing::debug!(
            host = %self.exec.host(),
            sequences = sequences.len(),
            "provisioned CPU control session"
        );
        Ok(CpuControl { session, sequences })
    }
}

#[async_trait]
impl Task for SetCpus {
    fn name(&self) -> &str {
        "set-cpus"
    }

    fn host(&self) -> &HostId {
        self.exec.host()
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.exec.host().to_string()),
            ("num", self.num.to_string()),
            ("seq", self.seq.clone()),
        ]
    }

    async fn start(&self, ctx: &RunContext) -> BenchResult<()> {
        // The profiling subsystem panics if CPUs hotplug under it.
        let _ = self
            .exec
            .run_unchecked(&CommandSpec::new("opcontrol").arg("--deinit").privileged())
            .await;

        let ids = {
            let mut cache = ctx.cpu_cache.lock().await;
            let control = match cache.entry(self.exec.host().clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.provision().await?),
            };

            let seq = control
                .sequences
                .get(&self.seq)
                .ok_or_else(|| BenchError::UnknownSequence {
                    name: self.seq.clone(),
                })?;
            if seq.len() < self.num {
                return Err(BenchError::InsufficientCapacity {
                    requested: self.num,
                    available: seq.len(),
                });
            }
            seq[..self.num]
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };

        self.exec
            .run(&CommandSpec::new(self.tool(SET_CPUS)).arg(&ids).privileged())
            .await?;
        tracing::info!(host = %self.exec.host(), cpus = %ids, "restricted host CPU set");
        Ok(())
    }

    async fn reset(&self, ctx: &RunContext) -> BenchResult<()> {
        let Some(control) = ctx.cpu_cache.lock().await.remove(self.exec.host()) else {
            return Ok(());
        };

        // Synchronously re-enable all CPUs before returning.
        let mut session = control.session;
        session.close_stdin().await?;
        session.wait().await?;
        tracing::debug!(host = %self.exec.host(), "restored full CPU set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use std::sync::atomic::Ordering;

    const TOOLS: &str = "/opt/tools";

    fn exec_with_sequences() -> Arc<MockExecutor> {
        let exec = Arc::new(MockExecutor::new("bench-01"));
        exec.set_output("/opt/tools/cpu-sequences", "seq 0,1,2,3\nrr 0,2,1,3\n");
        exec
    }

    fn set_cpus(exec: &Arc<MockExecutor>, num: usize, seq: &str) -> SetCpus {
        SetCpus::new(exec.clone() as Arc<dyn Executor>, TOOLS, num).with_sequence(seq)
    }

    #[tokio::test]
    async fn test_start_restricts_to_first_n_of_sequence() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");

        set_cpus(&exec, 2, "rr").start(&ctx).await.unwrap();

        let commands = exec.commands();
        assert!(commands.contains(&"sudo opcontrol --deinit".to_string()));
        assert!(commands.contains(&"sudo /opt/tools/set-cpus -i".to_string()));
        assert!(commands.contains(&"/opt/tools/cpu-sequences".to_string()));
        assert!(commands.contains(&"sudo /opt/tools/set-cpus 0,2".to_string()));
    }

    #[tokio::test]
    async fn test_reset_restores_full_cpu_set() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");
        let task = set_cpus(&exec, 2, "seq");

        task.start(&ctx).await.unwrap();
        let sessions = exec.spawns_matching("set-cpus -i");
        assert_eq!(sessions.len(), 1);

        task.reset(&ctx).await.unwrap();
        assert!(sessions[0].stdin_closed.load(Ordering::SeqCst));
        assert!(sessions[0].waited.load(Ordering::SeqCst));
        assert!(ctx.cpu_cache.lock().await.is_empty());

        // Reset again: cache entry is gone, so this is a no-op.
        task.reset(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_without_provisioning_is_noop() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");

        set_cpus(&exec, 2, "seq").reset(&ctx).await.unwrap();
        assert!(exec.commands().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sequence() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");

        let err = set_cpus(&exec, 2, "numa").start(&ctx).await.unwrap_err();
        match err {
            BenchError::UnknownSequence { name } => assert_eq!(name, "numa"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_insufficient_capacity() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");

        let err = set_cpus(&exec, 5, "seq").start(&ctx).await.unwrap_err();
        match err {
            BenchError::InsufficientCapacity {
                requested,
                available,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_same_host_shares_one_control_session() {
        let exec = exec_with_sequences();
        let ctx = RunContext::new("/tmp/out");

        set_cpus(&exec, 2, "seq").start(&ctx).await.unwrap();
        set_cpus(&exec, 4, "rr").start(&ctx).await.unwrap();

        // Provisioning ran once: one interactive session, one sequence query.
        assert_eq!(exec.spawns_matching("set-cpus -i").len(), 1);
        let queries = exec
            .commands()
            .iter()
            .filter(|c| c.contains("cpu-sequences"))
            .count();
        assert_eq!(queries, 1);
    }

    #[test]
    fn test_parse_sequences() {
        let parsed = parse_sequences("seq 0,1,2,3\n\nrr 0,2,1,3\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["seq"], vec![0, 1, 2, 3]);
        assert_eq!(parsed["rr"], vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_parse_sequences_malformed_line() {
        assert!(matches!(
            parse_sequences("noids\n").unwrap_err(),
            BenchError::Config(_)
        ));
        assert!(matches!(
            parse_sequences("seq 0,x,2\n").unwrap_err(),
            BenchError::Config(_)
        ));
    }
}
