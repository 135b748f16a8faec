use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::services::pipeline::GenerationPipeline;
use crate::services::queue::JobQueue;

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Lifecycle of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// Shutdown was signalled; the worker is finishing its current job, if any.
    Draining,
    Stopped,
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            STATE_RUNNING => WorkerState::Running,
            STATE_DRAINING => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Jobs that were still buffered and never reached a worker.
    pub undelivered: usize,
    /// Jobs processed over the pool's lifetime.
    pub processed: u64,
}

/// Fixed set of symmetric workers draining the job queue.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    pipeline: GenerationPipeline,
    shutdown: CancellationToken,
    states: Arc<Vec<AtomicU8>>,
    processed: Arc<AtomicU64>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers. Cancelling `parent` stops them as well.
    pub fn start(
        queue: Arc<JobQueue>,
        pipeline: GenerationPipeline,
        worker_count: usize,
        parent: &CancellationToken,
    ) -> Self {
        tracing::info!(worker_count, "Starting generation workers");

        let shutdown = parent.child_token();
        let states = Arc::new(
            (0..worker_count)
                .map(|_| AtomicU8::new(STATE_RUNNING))
                .collect::<Vec<_>>(),
        );
        let processed = Arc::new(AtomicU64::new(0));

        let handles = (0..worker_count)
            .map(|index| {
                let worker = Worker {
                    id: index + 1,
                    index,
                    queue: queue.clone(),
                    pipeline: pipeline.clone(),
                    shutdown: shutdown.clone(),
                    states: states.clone(),
                    processed: processed.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self {
            queue,
            pipeline,
            shutdown,
            states,
            processed,
            handles: Mutex::new(handles),
        }
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .map(|s| WorkerState::from(s.load(Ordering::Acquire)))
            .collect()
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Signal every worker to stop and wait up to `timeout` for all of them.
    ///
    /// In-flight jobs are not interrupted. If the timeout elapses the remaining
    /// workers are left to finish unobserved and `ShutdownTimeout` is returned.
    /// On success, jobs still buffered are marked failed and counted.
    pub async fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport, AppError> {
        tracing::info!("Shutting down generation workers");

        self.queue.close();
        self.shutdown.cancel();
        for state in self.states.iter() {
            let _ = state.compare_exchange(
                STATE_RUNNING,
                STATE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }

        let handles = match self.handles.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let joined = tokio::time::timeout(timeout, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Worker task ended abnormally");
                }
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!(
                ?timeout,
                buffered = self.queue.depth(),
                "Worker shutdown timed out"
            );
            return Err(AppError::ShutdownTimeout(timeout));
        }

        let undelivered = self.queue.drain().await;
        for job in &undelivered {
            self.pipeline
                .abandon(job, "Service shut down before the job was processed")
                .await;
        }

        let report = ShutdownReport {
            undelivered: undelivered.len(),
            processed: self.processed_count(),
        };
        tracing::info!(
            undelivered = report.undelivered,
            processed = report.processed,
            "Generation workers stopped"
        );
        Ok(report)
    }
}

struct Worker {
    id: usize,
    index: usize,
    queue: Arc<JobQueue>,
    pipeline: GenerationPipeline,
    shutdown: CancellationToken,
    states: Arc<Vec<AtomicU8>>,
    processed: Arc<AtomicU64>,
}

impl Worker {
    async fn run(self) {
        tracing::info!(worker_id = self.id, "Worker started");

        // Cancellation never interrupts a job; it only flips the worker to draining.
        while let Some(job) = self.queue.take(&self.shutdown).await {
            tracing::info!(
                worker_id = self.id,
                job_id = %job.job_id,
                user_id = job.user_id,
                template_id = job.template_id,
                "Processing generation job"
            );
            let run = self.pipeline.run(&job, self.id);
            tokio::pin!(run);
            let outcome = tokio::select! {
                outcome = &mut run => outcome,
                _ = self.shutdown.cancelled() => {
                    self.mark_draining();
                    run.await
                }
            };
            self.processed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker_id = self.id, job_id = %job.job_id, ?outcome, "Job finished");
        }

        self.mark_draining();
        self.states[self.index].store(STATE_STOPPED, Ordering::Release);
        tracing::info!(worker_id = self.id, "Worker stopped");
    }

    fn mark_draining(&self) {
        if self.states[self.index]
            .compare_exchange(
                STATE_RUNNING,
                STATE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            tracing::info!(worker_id = self.id, "Worker draining");
        }
    }
}
