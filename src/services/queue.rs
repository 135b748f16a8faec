use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::models::job::Job;

/// Bounded in-process job queue shared by request handlers and workers.
///
/// Many producers submit without blocking; many consumers take, and each job is
/// handed to exactly one of them.
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    receiver: Mutex<mpsc::Receiver<Job>>,
    capacity: usize,
    closed: CancellationToken,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a job without waiting for space.
    pub fn submit(&self, job: Job) -> Result<String, QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let job_id = job.job_id.clone();
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;

        metrics::gauge!("generation_queue_depth").set(self.depth() as f64);
        tracing::debug!(job_id = %job_id, depth = self.depth(), "Job queued");
        Ok(job_id)
    }

    /// Wait for the next job, or `None` once `cancel` fires.
    pub async fn take(&self, cancel: &CancellationToken) -> Option<Job> {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            job = async { self.receiver.lock().await.recv().await } => job,
        };

        if job.is_some() {
            metrics::gauge!("generation_queue_depth").set(self.depth() as f64);
        }
        job
    }

    /// Reject all further submissions.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Close the channel and return every job still buffered.
    ///
    /// A submit racing `close` either lands in the buffer before this runs or
    /// is refused by the channel afterwards; nothing is enqueued once drained.
    pub async fn drain(&self) -> Vec<Job> {
        self.close();
        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut jobs = Vec::new();
        while let Ok(job) = receiver.try_recv() {
            jobs.push(job);
        }
        metrics::gauge!("generation_queue_depth").set(self.depth() as f64);
        jobs
    }

    /// Number of jobs currently buffered.
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is full")]
    Full,

    #[error("Queue is closed")]
    Closed,
}
