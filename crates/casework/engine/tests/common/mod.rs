//! Test doubles shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use casework_engine::*;
use casework_types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Queue that records every enqueue and can be switched to fail
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<Job>>,
    unavailable: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let queue = Self::default();
        queue.unavailable.store(true, Ordering::SeqCst);
        Arc::new(queue)
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Queue for RecordingQueue {
    async fn enqueue(&self, case_id: &CaseId, stage: Stage) -> Result<JobHandle, QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("broker down".into()));
        }
        self.jobs
            .lock()
            .unwrap()
            .push(Job::new(case_id.clone(), stage));
        Ok(JobHandle::generate())
    }
}

/// Repository whose audit and approval writes always fail
pub struct LossyRepository {
    pub inner: InMemoryRepository,
}

#[async_trait]
impl CaseStorage for LossyRepository {
    async fn get_case(&self, id: &CaseId) -> StorageResult<Option<Case>> {
        self.inner.get_case(id).await
    }

    async fn insert_case(&self, case: Case) -> StorageResult<()> {
        self.inner.insert_case(case).await
    }

    async fn update_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        patch: &CasePatch,
    ) -> StorageResult<u64> {
        self.inner.update_case(id, expected_version, patch).await
    }

    async fn list_cases_by_status(
        &self,
        status: CaseStatus,
        limit: usize,
    ) -> StorageResult<Vec<Case>> {
        self.inner.list_cases_by_status(status, limit).await
    }
}

#[async_trait]
impl EventStorage for LossyRepository {
    async fn insert_event(&self, _event: CaseEvent) -> StorageResult<()> {
        Err(StorageError::Connection("event log unreachable".into()))
    }

    async fn list_events(&self, case_id: &CaseId) -> StorageResult<Vec<CaseEvent>> {
        self.inner.list_events(case_id).await
    }
}

#[async_trait]
impl ApprovalStorage for LossyRepository {
    async fn insert_approval(&self, _approval: Approval) -> StorageResult<()> {
        Err(StorageError::Connection("approvals unreachable".into()))
    }

    async fn get_approval(&self, id: &ApprovalId) -> StorageResult<Option<Approval>> {
        self.inner.get_approval(id).await
    }

    async fn decide_approval(
        &self,
        id: &ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> StorageResult<Approval> {
        self.inner.decide_approval(id, decision, decided_by).await
    }

    async fn list_approvals(&self, case_id: &CaseId) -> StorageResult<Vec<Approval>> {
        self.inner.list_approvals(case_id).await
    }
}

pub fn case() -> Case {
    Case::new(OrgId::new("acme"), "Handheld reader misses EPCs")
}

pub fn flag(tag: &str) -> RiskFlag {
    RiskFlag::new(tag).unwrap()
}

/// A registry where every stage returns `outcome`
pub fn always(outcome: StageOutcome) -> HandlerRegistry {
    HandlerRegistry::uniform(Arc::new(FnHandler::new(move |_case: Case| {
        let outcome = outcome.clone();
        async move { Ok(outcome) }
    })))
}

pub async fn setup(
    case: Case,
    handlers: HandlerRegistry,
) -> (CaseOrchestrator, Arc<InMemoryRepository>, Arc<RecordingQueue>) {
    let repo = Arc::new(InMemoryRepository::with_cases([case]).await);
    let queue = RecordingQueue::new();
    let orchestrator = CaseOrchestrator::new(repo.clone(), queue.clone(), handlers);
    (orchestrator, repo, queue)
}

pub async fn stored(repo: &InMemoryRepository, id: &CaseId) -> Case {
    repo.get_case(id).await.unwrap().unwrap()
}

pub async fn event_types(repo: &InMemoryRepository, id: &CaseId) -> Vec<EventType> {
    repo.list_events(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}
