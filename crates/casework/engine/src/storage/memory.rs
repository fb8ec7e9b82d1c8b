//! In-memory storage implementation

use super::traits::*;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use casework_types::{
    Approval, ApprovalDecision, ApprovalId, Case, CaseEvent, CaseId, CasePatch, CaseStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    cases: Arc<RwLock<HashMap<CaseId, Case>>>,
    events: Arc<RwLock<Vec<CaseEvent>>>,
    approvals: Arc<RwLock<Vec<Approval>>>,
}

impl InMemoryRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-loaded with cases
    pub async fn with_cases(cases: impl IntoIterator<Item = Case>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.cases.write().await;
            for case in cases {
                map.insert(case.id.clone(), case);
            }
        }
        repo
    }

    /// Total number of events across all cases
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl CaseStorage for InMemoryRepository {
    async fn get_case(&self, id: &CaseId) -> StorageResult<Option<Case>> {
        let cases = self.cases.read().await;
        Ok(cases.get(id).cloned())
    }

    async fn insert_case(&self, case: Case) -> StorageResult<()> {
        let mut cases = self.cases.write().await;
        if cases.contains_key(&case.id) {
            return Err(StorageError::Conflict(format!("case {} already exists", case.id)));
        }
        cases.insert(case.id.clone(), case);
        Ok(())
    }

    async fn update_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        patch: &CasePatch,
    ) -> StorageResult<u64> {
        let mut cases = self.cases.write().await;
        let case = cases
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("case {}", id)))?;

        if case.version != expected_version {
            return Err(StorageError::Conflict(format!(
                "case {} is at version {}, expected {}",
                id, case.version, expected_version
            )));
        }

        patch.apply_to(case);
        Ok(case.version)
    }

    async fn list_cases_by_status(
        &self,
        status: CaseStatus,
        limit: usize,
    ) -> StorageResult<Vec<Case>> {
        let cases = self.cases.read().await;
        let mut matching: Vec<Case> = cases
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl EventStorage for InMemoryRepository {
    async fn insert_event(&self, event: CaseEvent) -> StorageResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list_events(&self, case_id: &CaseId) -> StorageResult<Vec<CaseEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| &e.case_id == case_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ApprovalStorage for InMemoryRepository {
    async fn insert_approval(&self, approval: Approval) -> StorageResult<()> {
        self.approvals.write().await.push(approval);
        Ok(())
    }

    async fn get_approval(&self, id: &ApprovalId) -> StorageResult<Option<Approval>> {
        let approvals = self.approvals.read().await;
        Ok(approvals.iter().find(|a| &a.id == id).cloned())
    }

    async fn decide_approval(
        &self,
        id: &ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> StorageResult<Approval> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("approval {}", id)))?;

        if !approval.is_pending() {
            return Err(StorageError::Conflict(format!(
                "approval {} is already {}",
                id, approval.status
            )));
        }

        approval.decide(decision, decided_by);
        Ok(approval.clone())
    }

    async fn list_approvals(&self, case_id: &CaseId) -> StorageResult<Vec<Approval>> {
        let approvals = self.approvals.read().await;
        Ok(approvals
            .iter()
            .filter(|a| &a.case_id == case_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_types::{ApprovalStatus, OrgId, Stage};

    fn case() -> Case {
        Case::new(OrgId::new("acme"), "Reader firmware crash")
    }

    #[tokio::test]
    async fn update_applies_patch_and_bumps_version() {
        let c = case();
        let repo = InMemoryRepository::with_cases([c.clone()]).await;

        let patch = CasePatch::new().stage(Stage::Triage).retry_count(0);
        let version = repo.update_case(&c.id, 0, &patch).await.unwrap();
        assert_eq!(version, 1);

        let stored = repo.get_case(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Triage);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let c = case();
        let repo = InMemoryRepository::with_cases([c.clone()]).await;
        let patch = CasePatch::new().status(CaseStatus::InProgress);

        repo.update_case(&c.id, 0, &patch).await.unwrap();
        let err = repo.update_case(&c.id, 0, &patch).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_missing_case_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update_case(&CaseId::new("nope"), 0, &CasePatch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let c = case();
        let repo = InMemoryRepository::new();
        repo.insert_case(c.clone()).await.unwrap();
        assert!(matches!(
            repo.insert_case(c).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn decide_only_once() {
        let c = case();
        let repo = InMemoryRepository::new();
        let approval = Approval::pending(&c, Stage::PlanReview);
        let id = approval.id.clone();
        repo.insert_approval(approval).await.unwrap();

        let decided = repo
            .decide_approval(&id, ApprovalDecision::Approved, "lead")
            .await
            .unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);

        let again = repo
            .decide_approval(&id, ApprovalDecision::Rejected, "lead")
            .await;
        assert!(matches!(again, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_by_status_respects_limit() {
        let cases: Vec<Case> = (0..5).map(|_| case()).collect();
        let repo = InMemoryRepository::with_cases(cases).await;
        let listed = repo.list_cases_by_status(CaseStatus::Open, 3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(repo
            .list_cases_by_status(CaseStatus::Failed, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
