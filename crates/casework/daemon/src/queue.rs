//! In-process job queue backed by a bounded tokio channel

use async_trait::async_trait;
use casework_engine::{Job, JobHandle, Queue, QueueError};
use casework_types::{CaseId, Stage};
use tokio::sync::mpsc;

/// Channel-backed [`Queue`]; the receiving half feeds the worker pool
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    tx: mpsc::Sender<Job>,
}

impl ChannelQueue {
    /// Create a queue holding at most `capacity` undelivered jobs
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Queue for ChannelQueue {
    async fn enqueue(&self, case_id: &CaseId, stage: Stage) -> Result<JobHandle, QueueError> {
        // Never block: a worker enqueuing the next stage must not wait on
        // its own pool. A full queue leaves the case for the recovery sweep.
        self.tx
            .try_send(Job::new(case_id.clone(), stage))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(job) => {
                    QueueError::Unavailable(format!("queue full, dropped {}", job))
                }
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })?;
        Ok(JobHandle::generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order() {
        let (queue, mut rx) = ChannelQueue::new(4);
        let id = CaseId::new("c-1");
        queue.enqueue(&id, Stage::Intake).await.unwrap();
        queue.enqueue(&id, Stage::Triage).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().stage, Stage::Intake);
        assert_eq!(rx.recv().await.unwrap().stage, Stage::Triage);
    }

    #[tokio::test]
    async fn full_queue_is_unavailable() {
        let (queue, _rx) = ChannelQueue::new(1);
        let id = CaseId::new("c-1");
        queue.enqueue(&id, Stage::Intake).await.unwrap();
        let err = queue.enqueue(&id, Stage::Triage).await.unwrap_err();
        assert!(matches!(err, QueueError::Unavailable(_)));
    }

    #[tokio::test]
    async fn dropped_receiver_closes_queue() {
        let (queue, rx) = ChannelQueue::new(1);
        drop(rx);
        let err = queue.enqueue(&CaseId::new("c-1"), Stage::Intake).await.unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }
}
