//! Approval desk: resolves human gates and nudges cases back into the
//! workflow
//!
//! An approved gate puts the case back to `in_progress` at its current
//! stage and re-submits it. A rejected gate cancels the case. Only a case
//! waiting at the gate's own stage is moved.

use crate::effects::best_effort;
use crate::error::{ApprovalError, StorageError};
use crate::queue::Queue;
use crate::storage::Repository;
use casework_types::{
    Approval, ApprovalDecision, ApprovalId, ApprovalStatus, Case, CaseEvent, CaseId, CasePatch,
    CaseStatus, EventType, Stage,
};
use serde_json::json;
use std::sync::Arc;

/// What resolving an approval did to its case
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The case was resumed and (if `scheduled`) re-submitted at `stage`
    Resumed { case_id: CaseId, stage: Stage, scheduled: bool },
    /// The case was cancelled
    Cancelled { case_id: CaseId },
    /// The decision was recorded; the case was not waiting on this gate so
    /// it was left alone
    Recorded { case_id: CaseId },
}

/// Case writes attempted before a version conflict is reported
const APPLY_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct ApprovalDesk {
    repo: Arc<dyn Repository>,
    queue: Arc<dyn Queue>,
}

impl ApprovalDesk {
    pub fn new(repo: Arc<dyn Repository>, queue: Arc<dyn Queue>) -> Self {
        Self { repo, queue }
    }

    /// Decide a pending approval and move its case accordingly
    ///
    /// The decision is committed first. If a later case read or write
    /// fails, the error is returned and resolving again with the same
    /// decision finishes the job; a different decision is refused with
    /// [`ApprovalError::AlreadyDecided`].
    pub async fn resolve(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> Result<Resolution, ApprovalError> {
        let (approval, fresh) = match self
            .repo
            .decide_approval(approval_id, decision, decided_by)
            .await
        {
            Ok(approval) => (approval, true),
            Err(StorageError::NotFound(_)) => {
                return Err(ApprovalError::NotFound(approval_id.clone()))
            }
            Err(StorageError::Conflict(_)) => {
                let existing = self
                    .repo
                    .get_approval(approval_id)
                    .await?
                    .ok_or_else(|| ApprovalError::NotFound(approval_id.clone()))?;
                if existing.status != ApprovalStatus::from(decision) {
                    return Err(ApprovalError::AlreadyDecided {
                        id: approval_id.clone(),
                        status: existing.status,
                    });
                }
                (existing, false)
            }
            Err(e) => return Err(e.into()),
        };

        let mut case = self
            .repo
            .get_case(&approval.case_id)
            .await?
            .ok_or_else(|| ApprovalError::CaseNotFound(approval.case_id.clone()))?;

        if fresh {
            self.record_decision(&case, &approval, decision, decided_by).await;
        }

        let target = match decision {
            ApprovalDecision::Approved => CaseStatus::InProgress,
            ApprovalDecision::Rejected => CaseStatus::Cancelled,
        };
        let patch = CasePatch::new().status(target);

        let mut attempt = 1;
        loop {
            if case.status != CaseStatus::NeedsHuman || case.stage != approval.stage {
                tracing::info!(
                    case_id = %case.id,
                    approval_id = %approval.id,
                    gate_stage = %approval.stage,
                    stage = %case.stage,
                    status = %case.status,
                    "Case is not waiting on this gate; leaving case unchanged"
                );
                return Ok(Resolution::Recorded { case_id: case.id });
            }

            match self.repo.update_case(&case.id, case.version, &patch).await {
                Ok(_) => break,
                Err(StorageError::Conflict(_)) if attempt < APPLY_ATTEMPTS => {
                    attempt += 1;
                    case = self
                        .repo
                        .get_case(&approval.case_id)
                        .await?
                        .ok_or_else(|| ApprovalError::CaseNotFound(approval.case_id.clone()))?;
                }
                Err(e) => {
                    tracing::warn!(
                        case_id = %case.id,
                        approval_id = %approval.id,
                        error = %e,
                        "Approval decided but case not updated; resolve again to apply"
                    );
                    return Err(e.into());
                }
            }
        }

        match decision {
            ApprovalDecision::Approved => {
                let scheduled = match self.queue.enqueue(&case.id, case.stage).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(
                            case_id = %case.id,
                            stage = %case.stage,
                            error = %e,
                            "Approved case could not be re-submitted"
                        );
                        false
                    }
                };

                tracing::info!(case_id = %case.id, stage = %case.stage, by = decided_by, "Approval granted; case resumed");
                Ok(Resolution::Resumed {
                    case_id: case.id,
                    stage: case.stage,
                    scheduled,
                })
            }
            ApprovalDecision::Rejected => {
                tracing::info!(case_id = %case.id, stage = %case.stage, by = decided_by, "Approval rejected; case cancelled");
                Ok(Resolution::Cancelled { case_id: case.id })
            }
        }
    }

    async fn record_decision(
        &self,
        case: &Case,
        approval: &Approval,
        decision: ApprovalDecision,
        decided_by: &str,
    ) {
        let (event_type, verb) = match decision {
            ApprovalDecision::Approved => (EventType::ApprovalGranted, "approved"),
            ApprovalDecision::Rejected => (EventType::ApprovalRejected, "rejected"),
        };
        let event = CaseEvent::new(
            case,
            approval.stage,
            event_type,
            format!("{} gate {}", approval.gate_type, verb),
        )
        .with_actor(decided_by)
        .with_details(json!({
            "approval_id": approval.id,
            "gate_type": approval.gate_type,
        }));
        best_effort("insert_event", &case.id, self.repo.insert_event(event)).await;
    }
}
