mod common;

use chrono::Duration;
use common::*;
use casework_engine::*;
use casework_types::*;
use std::sync::Arc;

#[tokio::test]
async fn sweep_resubmits_open_and_stale_cases() {
    let open = case().positioned(Stage::Triage, CaseStatus::Open);
    let mut stale = case().positioned(Stage::Execute, CaseStatus::InProgress);
    stale.updated_at = chrono::Utc::now() - Duration::hours(2);
    let fresh = case().positioned(Stage::Plan, CaseStatus::InProgress);
    let waiting = case().positioned(Stage::PlanReview, CaseStatus::NeedsHuman);
    let done = case().positioned(Stage::Close, CaseStatus::Completed);

    let repo = Arc::new(
        InMemoryRepository::with_cases([
            open.clone(),
            stale.clone(),
            fresh,
            waiting,
            done,
        ])
        .await,
    );
    let queue = RecordingQueue::new();
    let sweep = RecoverySweep::new(repo, queue.clone(), Duration::minutes(15), 100);

    let report = sweep.run_once().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            scanned: 2,
            enqueued: 2,
            failed: 0
        }
    );

    let mut jobs = queue.jobs();
    jobs.sort_by(|a, b| a.stage.cmp(&b.stage));
    assert_eq!(
        jobs,
        vec![
            Job::new(open.id.clone(), Stage::Triage),
            Job::new(stale.id.clone(), Stage::Execute),
        ]
    );
}

#[tokio::test]
async fn sweep_counts_enqueue_failures() {
    let repo = Arc::new(InMemoryRepository::with_cases([case(), case()]).await);
    let sweep = RecoverySweep::new(repo, RecordingQueue::failing(), Duration::minutes(15), 100);

    let report = sweep.run_once().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.enqueued, 0);
}

#[tokio::test]
async fn recovered_delivery_unsticks_case() {
    let c = case();
    let repo = Arc::new(InMemoryRepository::with_cases([c.clone()]).await);

    // First advance cannot be scheduled.
    let broken = CaseOrchestrator::new(
        repo.clone(),
        RecordingQueue::failing(),
        always(StageOutcome::advance("ok")),
    );
    broken.process_case(&c.id, Stage::Intake).await;

    let queue = RecordingQueue::new();
    let sweep = RecoverySweep::new(repo.clone(), queue.clone(), Duration::minutes(15), 10);
    sweep.run_once().await.unwrap();
    assert_eq!(queue.jobs(), vec![Job::new(c.id.clone(), Stage::Triage)]);

    let orchestrator = CaseOrchestrator::new(repo.clone(), queue.clone(), always(StageOutcome::advance("ok")));
    orchestrator.process_case(&c.id, Stage::Triage).await;
    assert_eq!(stored(&repo, &c.id).await.stage, Stage::Plan);
}
