mod common;

use common::*;
use casework_engine::*;
use casework_types::*;
use std::sync::Arc;

async fn gated_case() -> (
    CaseOrchestrator,
    ApprovalDesk,
    Arc<InMemoryRepository>,
    Arc<RecordingQueue>,
    Case,
    Approval,
) {
    let c = case()
        .positioned(Stage::Execute, CaseStatus::Open)
        .with_risk_flag(flag("rls"));
    let (orchestrator, repo, queue) = setup(c.clone(), always(StageOutcome::advance("fixed"))).await;
    orchestrator.process_case(&c.id, Stage::Execute).await;

    let approval = repo.list_approvals(&c.id).await.unwrap().remove(0);
    let desk = ApprovalDesk::new(repo.clone(), queue.clone());
    (orchestrator, desk, repo, queue, c, approval)
}

#[tokio::test]
async fn approval_resumes_case_at_gated_stage() {
    let (orchestrator, desk, repo, queue, c, approval) = gated_case().await;
    assert_eq!(approval.stage, Stage::FixReview);

    let resolution = desk
        .resolve(&approval.id, ApprovalDecision::Approved, "lead@acme")
        .await
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::Resumed {
            case_id: c.id.clone(),
            stage: Stage::FixReview,
            scheduled: true
        }
    );

    let after = stored(&repo, &c.id).await;
    assert_eq!(after.status, CaseStatus::InProgress);
    assert_eq!(after.stage, Stage::FixReview);
    assert_eq!(queue.jobs().last(), Some(&Job::new(c.id.clone(), Stage::FixReview)));

    let events = repo.list_events(&c.id).await.unwrap();
    let granted = events
        .iter()
        .find(|e| e.event_type == EventType::ApprovalGranted)
        .unwrap();
    assert_eq!(granted.actor, "lead@acme");

    // The resumed delivery runs the review stage's handler. The next stage
    // is also a review stage and the rls flag is still set, so it gates again.
    orchestrator.process_case(&c.id, Stage::FixReview).await;
    let after = stored(&repo, &c.id).await;
    assert_eq!(after.stage, Stage::PolicyReview);
    assert_eq!(after.status, CaseStatus::NeedsHuman);
}

#[tokio::test]
async fn rejection_cancels_case() {
    let (orchestrator, desk, repo, queue, c, approval) = gated_case().await;
    let jobs_before = queue.jobs().len();

    let resolution = desk
        .resolve(&approval.id, ApprovalDecision::Rejected, "lead@acme")
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Cancelled { case_id: c.id.clone() });

    assert_eq!(stored(&repo, &c.id).await.status, CaseStatus::Cancelled);
    assert_eq!(queue.jobs().len(), jobs_before);

    let report = orchestrator.process_case(&c.id, Stage::FixReview).await;
    assert_eq!(
        report,
        ProcessReport::Skipped(SkipReason::Terminal(CaseStatus::Cancelled))
    );
}

#[tokio::test]
async fn approval_decided_only_once() {
    let (_orchestrator, desk, _repo, _queue, _c, approval) = gated_case().await;
    desk.resolve(&approval.id, ApprovalDecision::Approved, "a")
        .await
        .unwrap();

    let err = desk
        .resolve(&approval.id, ApprovalDecision::Rejected, "b")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApprovalError::AlreadyDecided {
            status: ApprovalStatus::Approved,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_approval_rejected() {
    let (_orchestrator, desk, _repo, _queue, _c, _approval) = gated_case().await;
    let err = desk
        .resolve(&ApprovalId::new("nope"), ApprovalDecision::Approved, "a")
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::NotFound(_)));
}

#[tokio::test]
async fn decision_on_non_waiting_case_is_only_recorded() {
    let c = case().positioned(Stage::Execute, CaseStatus::Failed);
    let repo = Arc::new(InMemoryRepository::with_cases([c.clone()]).await);
    let approval = Approval::pending(&c, Stage::Execute);
    repo.insert_approval(approval.clone()).await.unwrap();

    let desk = ApprovalDesk::new(repo.clone(), RecordingQueue::new());
    let resolution = desk
        .resolve(&approval.id, ApprovalDecision::Approved, "a")
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Recorded { case_id: c.id.clone() });
    assert_eq!(stored(&repo, &c.id).await, c);
    assert_eq!(
        event_types(&repo, &c.id).await,
        vec![EventType::ApprovalGranted]
    );
}

#[tokio::test]
async fn lost_audit_write_still_resumes_case() {
    let c = case().positioned(Stage::FixReview, CaseStatus::NeedsHuman);
    let inner = InMemoryRepository::with_cases([c.clone()]).await;
    let approval = Approval::pending(&c, Stage::FixReview);
    inner.insert_approval(approval.clone()).await.unwrap();
    let repo = Arc::new(LossyRepository { inner });
    let queue = RecordingQueue::new();

    let desk = ApprovalDesk::new(repo.clone(), queue.clone());
    let resolution = desk
        .resolve(&approval.id, ApprovalDecision::Approved, "lead@acme")
        .await
        .unwrap();
    assert_eq!(
        resolution,
        Resolution::Resumed {
            case_id: c.id.clone(),
            stage: Stage::FixReview,
            scheduled: true
        }
    );

    let after = repo.get_case(&c.id).await.unwrap().unwrap();
    assert_eq!(after.status, CaseStatus::InProgress);
    assert_eq!(after.stage, Stage::FixReview);
    assert_eq!(queue.jobs(), vec![Job::new(c.id.clone(), Stage::FixReview)]);
    assert!(repo.list_events(&c.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_gate_does_not_release_other_stage() {
    let c = case().positioned(Stage::PolicyReview, CaseStatus::NeedsHuman);
    let repo = Arc::new(InMemoryRepository::with_cases([c.clone()]).await);
    let stale = Approval::pending(&c, Stage::FixReview);
    repo.insert_approval(stale.clone()).await.unwrap();

    let queue = RecordingQueue::new();
    let desk = ApprovalDesk::new(repo.clone(), queue.clone());
    let resolution = desk
        .resolve(&stale.id, ApprovalDecision::Approved, "a")
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::Recorded { case_id: c.id.clone() });
    assert_eq!(stored(&repo, &c.id).await.status, CaseStatus::NeedsHuman);
    assert!(queue.jobs().is_empty());
}
