//! Test doubles for the executor seam

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mailbench_remote::{
    CommandOutput, CommandSpec, ExecError, ExecResult, Executor, HostId, ProcessHandle, Signal,
};

/// Render a command the way assertions want to see it: `sudo` prefix for
/// privileged commands, program and arguments joined by spaces.
pub(crate) fn render(spec: &CommandSpec) -> String {
    let mut line = String::new();
    if spec.privileged {
        line.push_str("sudo ");
    }
    line.push_str(&spec.program);
    for arg in &spec.args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[derive(Default)]
struct FileEntry {
    content: Option<String>,
    reveal_after: usize,
    reads: usize,
}

/// Inspectable state shared between a [`MockProcess`] and the test.
#[derive(Default, Debug)]
pub(crate) struct ProcState {
    pub(crate) stdin_closed: AtomicBool,
    pub(crate) waited: AtomicBool,
    pub(crate) signals: Mutex<Vec<Signal>>,
}

/// A spawn recorded by [`MockExecutor`].
pub(crate) struct SpawnRecord {
    pub(crate) command: String,
    pub(crate) state: Arc<ProcState>,
}

/// Scripted in-memory executor.
pub(crate) struct MockExecutor {
    host: HostId,
    files: Mutex<HashMap<PathBuf, FileEntry>>,
    outputs: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<String, i32>>,
    pub(crate) runs: Mutex<Vec<String>>,
    pub(crate) spawned: Mutex<Vec<SpawnRecord>>,
}

impl MockExecutor {
    pub(crate) fn new(host: &str) -> Self {
        Self {
            host: HostId::from(host),
            files: Mutex::new(HashMap::new()),
            outputs: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Make `path` readable with the given content.
    pub(crate) fn set_file(&self, path: &Path, content: &str) {
        self.files.lock().unwrap().insert(
            path.to_path_buf(),
            FileEntry {
                content: Some(content.to_string()),
                reveal_after: 0,
                reads: 0,
            },
        );
    }

    /// Make `path` read as empty for the first `attempts` reads, then as
    /// `content`.
    pub(crate) fn set_file_after(&self, path: &Path, attempts: usize, content: &str) {
        self.files.lock().unwrap().insert(
            path.to_path_buf(),
            FileEntry {
                content: Some(content.to_string()),
                reveal_after: attempts,
                reads: 0,
            },
        );
    }

    /// Number of reads observed for `path`, including failed ones.
    pub(crate) fn reads(&self, path: &Path) -> usize {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|e| e.reads)
            .unwrap_or(0)
    }

    /// Canned stdout for a program run with `run`/`run_unchecked`.
    pub(crate) fn set_output(&self, program: &str, stdout: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(program.to_string(), stdout.to_string());
    }

    /// Make a program exit with the given non-zero code.
    pub(crate) fn fail_with(&self, program: &str, code: i32) {
        self.failures
            .lock()
            .unwrap()
            .insert(program.to_string(), code);
    }

    /// Rendered command lines run so far, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    /// Spawn records whose rendered command contains `needle`.
    pub(crate) fn spawns_matching(&self, needle: &str) -> Vec<Arc<ProcState>> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.command.contains(needle))
            .map(|r| Arc::clone(&r.state))
            .collect()
    }

    fn canned(&self, spec: &CommandSpec) -> (Option<i32>, String) {
        let code = self
            .failures
            .lock()
            .unwrap()
            .get(&spec.program)
            .copied()
            .unwrap_or(0);
        let stdout = self
            .outputs
            .lock()
            .unwrap()
            .get(&spec.program)
            .cloned()
            .unwrap_or_default();
        (Some(code), stdout)
    }
}

#[async_trait]
impl Executor for MockExecutor {
    fn host(&self) -> &HostId {
        &self.host
    }

    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        self.runs.lock().unwrap().push(render(spec));
        let (status, stdout) = self.canned(spec);
        if status != Some(0) {
            return Err(ExecError::NonZeroExit {
                program: spec.program.clone(),
                code: status.unwrap_or(-1),
            });
        }
        Ok(CommandOutput { status, stdout })
    }

    async fn run_unchecked(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        self.runs.lock().unwrap().push(render(spec));
        let (status, stdout) = self.canned(spec);
        Ok(CommandOutput { status, stdout })
    }

    async fn spawn(&self, spec: &CommandSpec) -> ExecResult<Box<dyn ProcessHandle>> {
        let state = Arc::new(ProcState::default());
        self.spawned.lock().unwrap().push(SpawnRecord {
            command: render(spec),
            state: Arc::clone(&state),
        });
        Ok(Box::new(MockProcess { state }))
    }

    async fn read_file(&self, path: &Path) -> ExecResult<String> {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.to_path_buf()).or_default();
        entry.reads += 1;
        match &entry.content {
            Some(content) if entry.reads > entry.reveal_after => Ok(content.clone()),
            Some(_) => Ok(String::new()),
            None => Err(ExecError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}

/// Handle returned by [`MockExecutor::spawn`].
#[derive(Debug)]
pub(crate) struct MockProcess {
    state: Arc<ProcState>,
}

#[async_trait]
impl ProcessHandle for MockProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    async fn signal(&mut self, signal: Signal) -> ExecResult<()> {
        self.state.signals.lock().unwrap().push(signal);
        Ok(())
    }

    async fn close_stdin(&mut self) -> ExecResult<()> {
        self.state.stdin_closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> ExecResult<Option<i32>> {
        self.state.waited.store(true, Ordering::SeqCst);
        Ok(Some(0))
    }
}
