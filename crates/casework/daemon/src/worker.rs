//! Bounded worker pool
//!
//! Pulls jobs off the channel and runs at most `concurrency` deliveries at
//! once. Deliveries for different cases run in parallel; the guard keeps
//! duplicate deliveries for the same case harmless.

use casework_engine::{CaseOrchestrator, Job, Queue};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::Duration;

pub struct WorkerPool {
    orchestrator: CaseOrchestrator,
    queue: Arc<dyn Queue>,
    concurrency: usize,
    retry_backoff: Duration,
}

impl WorkerPool {
    pub fn new(
        orchestrator: CaseOrchestrator,
        queue: Arc<dyn Queue>,
        concurrency: usize,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            concurrency: concurrency.max(1),
            retry_backoff,
        }
    }

    /// Process jobs until the channel closes or `shutdown` flips to true,
    /// then wait for in-flight deliveries to finish
    pub async fn run(self, mut jobs: mpsc::Receiver<Job>, mut shutdown: watch::Receiver<bool>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!(concurrency = self.concurrency, "Worker pool started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let job = tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let orchestrator = self.orchestrator.clone();
            let queue = self.queue.clone();
            let backoff = self.retry_backoff;

            tokio::spawn(async move {
                let report = orchestrator.process_case(&job.case_id, job.stage).await;
                drop(permit);

                if let Some(stage) = report.redelivery() {
                    tokio::time::sleep(backoff).await;
                    if let Err(e) = queue.enqueue(&job.case_id, stage).await {
                        tracing::warn!(
                            case_id = %job.case_id,
                            stage = %stage,
                            error = %e,
                            "Redelivery failed; case left for recovery sweep"
                        );
                    }
                }
            });
        }

        // Drain: every permit back means no delivery is still running.
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        tracing::info!("Worker pool stopped");
    }
}
