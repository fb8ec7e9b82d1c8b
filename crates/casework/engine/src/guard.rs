//! Guard/loader: rejects inapplicable or duplicate deliveries before any
//! handler runs
//!
//! A skipped delivery performs no mutation. This is what makes
//! at-least-once delivery safe: once a case has left a stage, a second
//! delivery for that stage no longer matches `case.stage`.

use crate::error::{StorageError, StorageResult};
use crate::storage::Repository;
use casework_types::{Case, CaseId, CasePatch, CaseStatus, Stage};
use std::sync::Arc;

/// Why a delivery was skipped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The case is no longer at the delivered stage
    StageMismatch { expected: Stage, actual: Stage },
    /// The case reached a terminal status
    Terminal(CaseStatus),
    /// The case waits for a human decision
    AwaitingHuman,
    /// Another delivery claimed the case first
    Superseded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::StageMismatch { expected, actual } => {
                write!(f, "stage mismatch: delivered {}, case at {}", expected, actual)
            }
            SkipReason::Terminal(status) => write!(f, "case is {}", status),
            SkipReason::AwaitingHuman => f.write_str("awaiting human approval"),
            SkipReason::Superseded => f.write_str("claimed by another delivery"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Skip(SkipReason),
}

/// Decide whether `case` may be processed for a delivery at `expected_stage`
pub fn check_eligible(case: &Case, expected_stage: Stage) -> Eligibility {
    if case.status.is_terminal() {
        return Eligibility::Skip(SkipReason::Terminal(case.status));
    }
    if case.stage != expected_stage {
        return Eligibility::Skip(SkipReason::StageMismatch {
            expected: expected_stage,
            actual: case.stage,
        });
    }
    if case.status == CaseStatus::NeedsHuman {
        return Eligibility::Skip(SkipReason::AwaitingHuman);
    }
    Eligibility::Eligible
}

/// Loads cases and marks them in progress
#[derive(Clone)]
pub struct Guard {
    repo: Arc<dyn Repository>,
}

impl Guard {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Fetch the current case snapshot
    pub async fn load(&self, case_id: &CaseId) -> StorageResult<Case> {
        self.repo
            .get_case(case_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("case {}", case_id)))
    }

    /// Mark an eligible case `in_progress`.
    ///
    /// Returns the snapshot the handler should see, or `None` when another
    /// writer bumped the case version since it was loaded. Any other write
    /// failure is logged and the original snapshot is returned; the marker
    /// is a visibility signal.
    pub async fn claim(&self, case: &Case) -> Option<Case> {
        let patch = CasePatch::new().status(CaseStatus::InProgress);
        match self.repo.update_case(&case.id, case.version, &patch).await {
            Ok(version) => {
                let mut claimed = case.clone();
                claimed.status = CaseStatus::InProgress;
                claimed.version = version;
                Some(claimed)
            }
            Err(StorageError::Conflict(reason)) => {
                tracing::debug!(
                    case_id = %case.id,
                    stage = %case.stage,
                    reason = %reason,
                    "Claim lost to a concurrent delivery"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    case_id = %case.id,
                    stage = %case.stage,
                    error = %e,
                    "Failed to mark case in progress; continuing"
                );
                Some(case.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CaseStorage, InMemoryRepository};
    use casework_types::OrgId;

    fn case_at(stage: Stage, status: CaseStatus) -> Case {
        Case::new(OrgId::new("acme"), "t").positioned(stage, status)
    }

    #[test]
    fn matching_open_case_is_eligible() {
        let case = case_at(Stage::Triage, CaseStatus::Open);
        assert_eq!(check_eligible(&case, Stage::Triage), Eligibility::Eligible);
    }

    #[test]
    fn in_progress_case_is_eligible() {
        let case = case_at(Stage::Execute, CaseStatus::InProgress);
        assert_eq!(check_eligible(&case, Stage::Execute), Eligibility::Eligible);
    }

    #[test]
    fn stale_delivery_skipped() {
        let case = case_at(Stage::Plan, CaseStatus::Open);
        assert_eq!(
            check_eligible(&case, Stage::Triage),
            Eligibility::Skip(SkipReason::StageMismatch {
                expected: Stage::Triage,
                actual: Stage::Plan
            })
        );
    }

    #[test]
    fn terminal_cases_skipped() {
        for status in [CaseStatus::Completed, CaseStatus::Failed, CaseStatus::Cancelled] {
            let case = case_at(Stage::Execute, status);
            assert_eq!(
                check_eligible(&case, Stage::Execute),
                Eligibility::Skip(SkipReason::Terminal(status))
            );
        }
    }

    #[test]
    fn waiting_case_skipped() {
        let case = case_at(Stage::PlanReview, CaseStatus::NeedsHuman);
        assert_eq!(
            check_eligible(&case, Stage::PlanReview),
            Eligibility::Skip(SkipReason::AwaitingHuman)
        );
    }

    #[tokio::test]
    async fn load_missing_case_is_not_found() {
        let guard = Guard::new(Arc::new(InMemoryRepository::new()));
        let err = guard.load(&CaseId::new("missing")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_claim_on_same_snapshot_loses() {
        let case = case_at(Stage::Triage, CaseStatus::Open);
        let repo = Arc::new(InMemoryRepository::with_cases([case.clone()]).await);
        let guard = Guard::new(repo.clone());

        let claimed = guard.claim(&case).await.unwrap();
        assert_eq!(claimed.status, CaseStatus::InProgress);
        assert_eq!(claimed.version, 1);

        assert!(guard.claim(&case).await.is_none());
        let stored = repo.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }
}
