//! Recovery sweep for stuck-but-consistent cases
//!
//! A case can be correctly positioned yet unscheduled: the enqueue after
//! an advance failed, a redelivery was lost, or a worker died mid-handler.
//! The sweep re-submits `open` cases and `in_progress` cases that have not
//! been touched for `stale_after`. Duplicate deliveries are dropped by the
//! guard.

use crate::error::StorageResult;
use crate::queue::Queue;
use crate::storage::Repository;
use casework_types::CaseStatus;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Counts from one sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub scanned: usize,
    pub enqueued: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct RecoverySweep {
    repo: Arc<dyn Repository>,
    queue: Arc<dyn Queue>,
    stale_after: Duration,
    batch_size: usize,
}

impl RecoverySweep {
    pub fn new(
        repo: Arc<dyn Repository>,
        queue: Arc<dyn Queue>,
        stale_after: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            repo,
            queue,
            stale_after,
            batch_size,
        }
    }

    pub async fn run_once(&self) -> StorageResult<RecoveryReport> {
        let cutoff = Utc::now() - self.stale_after;

        let mut candidates = self
            .repo
            .list_cases_by_status(CaseStatus::Open, self.batch_size)
            .await?;
        let stale = self
            .repo
            .list_cases_by_status(CaseStatus::InProgress, self.batch_size)
            .await?
            .into_iter()
            .filter(|c| c.updated_at < cutoff);
        candidates.extend(stale);

        let mut report = RecoveryReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for case in candidates {
            match self.queue.enqueue(&case.id, case.stage).await {
                Ok(_) => report.enqueued += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(case_id = %case.id, stage = %case.stage, error = %e, "Recovery enqueue failed");
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                enqueued = report.enqueued,
                failed = report.failed,
                "Recovery sweep finished"
            );
        }
        Ok(report)
    }
}
