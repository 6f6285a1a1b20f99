//! Bounded-concurrency execution of job descriptors with per-job failure isolation.

use smac_types::{SmacError, SmacResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::job::{JobDescriptor, JobError, JobRecord, RunReport};
use crate::launcher::JobRunner;

/// A fixed number of worker slots fed from a queue of jobs.
#[derive(Clone)]
pub struct RunPool {
    runner: Arc<dyn JobRunner>,
}

impl RunPool {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }

    /// Run every job with at most `num_procs` in flight and wait for all of them.
    ///
    /// Jobs start in queue order. A failing or panicking job is recorded in
    /// the report and never affects its siblings.
    pub async fn execute(&self, jobs: Vec<JobDescriptor>, num_procs: usize) -> SmacResult<RunReport> {
        if num_procs == 0 {
            return Err(SmacError::invalid_argument("the number of processes must be positive"));
        }

        info!("Dispatching {} runs on {} workers", jobs.len(), num_procs);
        let mut records: Vec<JobRecord> = jobs.iter().map(|j| JobRecord::new(j.id, j.seed)).collect();
        let slots = Arc::new(Semaphore::new(num_procs));
        let mut workers = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                warn!("Worker slots closed before run {} could start", job.seed);
                records[index].mark_failed(&JobError::Runner {
                    message: "worker slots closed".to_string(),
                });
                continue;
            };
            let runner = Arc::clone(&self.runner);
            let mut record = records[index].clone();

            workers.spawn(async move {
                let _permit = permit;
                let seed = job.seed;
                record.mark_running();

                // A nested task turns a panicking runner into an ordinary failure.
                let outcome = match tokio::spawn(async move { runner.run(job).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(JobError::Panicked {
                        message: e.to_string(),
                    }),
                };

                match outcome {
                    Ok(()) => record.mark_succeeded(),
                    Err(e) => {
                        warn!("Run {} failed: {}", seed, e);
                        record.mark_failed(&e);
                    }
                }
                (index, record)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, record)) => records[index] = record,
                Err(e) => warn!("Worker task ended abnormally: {}", e),
            }
        }

        let report = RunReport { records };
        info!(
            "All runs finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }
}
