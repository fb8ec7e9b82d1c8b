//! Storage trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use casework_types::{
    Approval, ApprovalDecision, ApprovalId, Case, CaseEvent, CaseId, CasePatch, CaseStatus,
};

/// Combined storage trait
pub trait Repository: CaseStorage + EventStorage + ApprovalStorage + Send + Sync {}

impl<T> Repository for T where T: CaseStorage + EventStorage + ApprovalStorage + Send + Sync {}

/// Storage for cases
#[async_trait]
pub trait CaseStorage: Send + Sync {
    /// Get a case by ID
    async fn get_case(&self, id: &CaseId) -> StorageResult<Option<Case>>;

    /// Create a case. Fails with `Conflict` if the ID is taken.
    async fn insert_case(&self, case: Case) -> StorageResult<()>;

    /// Apply a patch if the stored version still equals `expected_version`.
    ///
    /// Returns the new version. A version mismatch is `Conflict`; a
    /// missing case is `NotFound`.
    async fn update_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        patch: &CasePatch,
    ) -> StorageResult<u64>;

    /// Cases in a status, least recently updated first
    async fn list_cases_by_status(&self, status: CaseStatus, limit: usize)
        -> StorageResult<Vec<Case>>;
}

/// Append-only audit log
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Append an event
    async fn insert_event(&self, event: CaseEvent) -> StorageResult<()>;

    /// Events for a case, oldest first
    async fn list_events(&self, case_id: &CaseId) -> StorageResult<Vec<CaseEvent>>;
}

/// Storage for human approval gates
#[async_trait]
pub trait ApprovalStorage: Send + Sync {
    /// Create an approval
    async fn insert_approval(&self, approval: Approval) -> StorageResult<()>;

    /// Get an approval by ID
    async fn get_approval(&self, id: &ApprovalId) -> StorageResult<Option<Approval>>;

    /// Record a decision on a pending approval.
    ///
    /// `NotFound` if missing, `Conflict` if it is no longer pending.
    async fn decide_approval(
        &self,
        id: &ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> StorageResult<Approval>;

    /// Approvals for a case, oldest first
    async fn list_approvals(&self, case_id: &CaseId) -> StorageResult<Vec<Approval>>;
}
