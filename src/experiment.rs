//! Experiment assembly and execution
//!
//! Wires the mail benchmark out of core tasks, in dependency order: the
//! filesystem precondition, the CPU restriction, the daemon, the system
//! monitor, and the trial runner. The manager drives the rest.

use std::sync::Arc;

use mailbench_core::{
    BenchmarkRunner, FileSystem, Manager, Measurement, RunContext, SetCpus, SystemMonitor,
};
use mailbench_remote::{Executor, HostId, LocalExecutor};

use crate::config::BenchConfig;
use crate::mail::{MailDaemon, MailLoad};

/// Run one experiment and return the collected measurements.
pub async fn run(cfg: &BenchConfig) -> anyhow::Result<Vec<(String, Measurement)>> {
    cfg.validate()?;

    let host = HostId::from(cfg.host.as_str());
    let exec: Arc<dyn Executor> = Arc::new(LocalExecutor::new(host.clone()));

    let mut manager = Manager::new(RunContext::new(&cfg.workdir));

    let fs = Arc::new(FileSystem::new(exec.clone(), &cfg.tools_dir, cfg.fs.as_str()));
    let mail_dir = format!("{}0", fs.path());
    let spool_dir = format!("{}spool", fs.path());
    manager.add(fs);

    manager.add(Arc::new(
        SetCpus::new(exec.clone(), &cfg.tools_dir, cfg.cores).with_sequence(cfg.seq.as_str()),
    ));

    manager.add(Arc::new(
        MailDaemon::new(
            exec.clone(),
            &cfg.bench_root,
            cfg.daemon_build.as_str(),
            mail_dir,
            spool_dir,
            cfg.port,
            cfg.instances,
        )
        .with_ready_timeout(cfg.ready_timeout_secs),
    ));

    let sysmon = Arc::new(SystemMonitor::new(exec.clone(), &cfg.tools_dir));
    manager.add(sysmon.clone());

    let load = MailLoad::new(exec.clone(), &cfg.bench_root, cfg.clients, cfg.port, sysmon);
    manager.add(Arc::new(BenchmarkRunner::new(host, cfg.trials, load)));

    manager.run().await?;
    Ok(manager.results())
}
