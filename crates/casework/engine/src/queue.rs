//! Job queue seam
//!
//! The queue delivers `(case_id, stage)` jobs to
//! [`CaseOrchestrator::process_case`](crate::CaseOrchestrator::process_case)
//! at least once. The engine only ever enqueues.

use crate::error::QueueError;
use async_trait::async_trait;
use casework_types::{CaseId, Stage};
use serde::{Deserialize, Serialize};

/// A unit of work: process `case_id` at `stage`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub case_id: CaseId,
    pub stage: Stage,
}

impl Job {
    pub fn new(case_id: CaseId, stage: Stage) -> Self {
        Self { case_id, stage }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.case_id, self.stage)
    }
}

/// Broker-assigned handle for an enqueued job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
}

impl JobHandle {
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Schedule `case_id` for processing at `stage`
    async fn enqueue(&self, case_id: &CaseId, stage: Stage) -> Result<JobHandle, QueueError>;
}
