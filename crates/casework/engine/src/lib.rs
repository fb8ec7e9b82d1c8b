//! Casework orchestrator
//!
//! A resumable, multi-stage workflow engine that drives a case through
//! the ten ordered stages of [`casework_types::Stage`], handling retries,
//! risk-triggered human approval gates and an append-only audit trail.
//!
//! # Key Principle
//!
//! **Handlers decide what happened; the engine decides what it means.**
//! Stage handlers only ever see an immutable snapshot of the case. The
//! stage and status are written exclusively by the transition engine.
//!
//! # Architecture
//!
//! [`CaseOrchestrator::process_case`] handles one `(case_id, stage)`
//! delivery:
//!
//! - [`guard`]: loads the case and drops stale, terminal or waiting
//!   deliveries without touching the store
//! - [`handler`]: the pluggable per-stage work
//! - [`transition`]: turns the handler's verdict into a patch, audit
//!   events, an optional approval and the next enqueue
//! - [`risk_gate`]: whether entering a review stage needs sign-off
//!
//! Around it sit [`ApprovalDesk`] for resolving gates and
//! [`RecoverySweep`] for re-submitting stuck cases. Storage and the job
//! queue are reached through the [`Repository`] and [`Queue`] traits.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use casework_engine::*;
//! use casework_types::*;
//!
//! struct NullQueue;
//!
//! #[async_trait]
//! impl Queue for NullQueue {
//!     async fn enqueue(&self, _: &CaseId, _: Stage) -> Result<JobHandle, QueueError> {
//!         Ok(JobHandle::generate())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let case = Case::new(OrgId::new("acme"), "Gate reader offline");
//! let id = case.id.clone();
//! let repo = Arc::new(InMemoryRepository::with_cases([case]).await);
//!
//! let advance = Arc::new(FnHandler::new(|_case: Case| async {
//!     Ok(StageOutcome::advance("done"))
//! }));
//! let orchestrator = CaseOrchestrator::new(
//!     repo.clone(),
//!     Arc::new(NullQueue),
//!     HandlerRegistry::uniform(advance),
//! );
//!
//! orchestrator.process_case(&id, Stage::Intake).await;
//! let case = repo.get_case(&id).await.unwrap().unwrap();
//! assert_eq!(case.stage, Stage::Triage);
//! assert_eq!(case.status, CaseStatus::Open);
//! # });
//! ```

#![deny(unsafe_code)]

pub mod approvals;
pub mod effects;
pub mod error;
pub mod guard;
pub mod handler;
pub mod orchestrator;
pub mod queue;
pub mod recovery;
pub mod risk_gate;
pub mod storage;
pub mod transition;

// Re-export main types
pub use approvals::{ApprovalDesk, Resolution};
pub use error::{ApprovalError, HandlerError, HandlerResult, QueueError, StorageError, StorageResult};
pub use guard::{check_eligible, Eligibility, Guard, SkipReason};
pub use handler::{FnHandler, HandlerRegistry, StageHandler};
pub use orchestrator::{CaseOrchestrator, ProcessReport};
pub use queue::{Job, JobHandle, Queue};
pub use recovery::{RecoveryReport, RecoverySweep};
pub use risk_gate::{is_review_stage, requires_human_gate, NEVER_AUTO_PASS};
pub use storage::{ApprovalStorage, CaseStorage, EventStorage, InMemoryRepository, Repository};
pub use transition::{HandlerVerdict, Transition, TransitionPlan};
