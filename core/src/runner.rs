//! Trial repetition and best-result aggregation

use async_trait::async_trait;
use mailbench_remote::HostId;

use crate::error::{BenchError, BenchResult};
use crate::manager::RunContext;
use crate::results::{Measurement, ResultSlot, ResultsProvider};
use crate::task::Task;

/// A single parameterized trial procedure.
#[async_trait]
pub trait Trial: Send + Sync {
    /// Run trial number `trial` (zero-based) and return its measurement.
    async fn run_trial(&self, ctx: &RunContext, trial: usize) -> BenchResult<Measurement>;
}

/// Repeats a trial procedure and retains the best (maximum) result.
///
/// Trials run strictly sequentially; they share the host's CPU and I/O
/// resources and must not overlap. Transient host interference only ever
/// depresses throughput-style metrics, so the maximum is the most
/// representative of steady-state capability. Every trial must report the
/// same unit.
pub struct BenchmarkRunner<T> {
    host: HostId,
    trials: usize,
    procedure: T,
    result: ResultSlot,
}

impl<T: Trial> BenchmarkRunner<T> {
    /// Run `procedure` exactly `trials` times during the wait phase.
    pub fn new(host: HostId, trials: usize, procedure: T) -> Self {
        Self {
            host,
            trials,
            procedure,
            result: ResultSlot::new(),
        }
    }
}

impl<T: Trial> ResultsProvider for BenchmarkRunner<T> {
    fn set_result(&self, measurement: Measurement) {
        self.result.set(measurement);
    }

    fn result(&self) -> Option<Measurement> {
        self.result.get()
    }
}

#[async_trait]
impl<T: Trial> Task for BenchmarkRunner<T> {
    fn name(&self) -> &str {
        "bench"
    }

    fn host(&self) -> &HostId {
        &self.host
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.host.to_string()),
            ("trials", self.trials.to_string()),
        ]
    }

    async fn start(&self, _ctx: &RunContext) -> BenchResult<()> {
        Ok(())
    }

    async fn wait(&self, ctx: &RunContext) -> BenchResult<()> {
        let mut best: Option<Measurement> = None;
        for trial in 0..self.trials {
            tracing::info!(trial = trial + 1, total = self.trials, "running trial");
            let measurement = self.procedure.run_trial(ctx, trial).await?;
            tracing::info!(result = measurement.value, unit = %measurement.unit, "trial finished");

            best = Some(match best {
                None => measurement,
                Some(best) => {
                    if measurement.unit != best.unit {
                        return Err(BenchError::InconsistentUnits {
                            expected: best.unit,
                            actual: measurement.unit,
                        });
                    }
                    if measurement.value > best.value {
                        measurement
                    } else {
                        best
                    }
                }
            });
        }

        if let Some(best) = best {
            self.set_result(best);
        }
        Ok(())
    }

    fn as_results(&self) -> Option<&dyn ResultsProvider> {
        Some(self)
    }
}
