//! Case orchestrator: the entry point for one `(case_id, stage)` delivery
//!
//! Composes guard → stage handler → transition engine. The orchestrator
//! owns workflow position; handlers only report what happened.
//!
//! `process_case` never fails. Every failure is turned into a case
//! transition or a log line, and the returned [`ProcessReport`] describes
//! what was decided.

use crate::effects::best_effort;
use crate::error::StorageError;
use crate::guard::{check_eligible, Eligibility, Guard, SkipReason};
use crate::handler::HandlerRegistry;
use crate::queue::Queue;
use crate::storage::Repository;
use crate::transition::{self, HandlerVerdict, Transition, TransitionPlan};
use casework_types::{Case, CaseId, Stage};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Outcome of one delivery, for observation by the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessReport {
    /// No case with this ID
    NotFound,
    /// The case could not be read; nothing was changed
    LoadFailed { error: String },
    /// The delivery did not apply; nothing was changed
    Skipped(SkipReason),
    /// The transition was written. `scheduled` is true when the next
    /// stage was enqueued successfully.
    Applied { transition: Transition, scheduled: bool },
    /// Another writer changed the case before the transition was written;
    /// no further side effects were performed
    Superseded { transition: Transition },
}

impl ProcessReport {
    /// Stage to redeliver after a recoverable handler error
    pub fn redelivery(&self) -> Option<Stage> {
        match self {
            ProcessReport::Applied { transition, .. } => transition.redelivery(),
            _ => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ProcessReport::Skipped(_))
    }
}

/// Drives cases through the stage table
#[derive(Clone)]
pub struct CaseOrchestrator {
    repo: Arc<dyn Repository>,
    queue: Arc<dyn Queue>,
    handlers: HandlerRegistry,
    guard: Guard,
}

impl CaseOrchestrator {
    pub fn new(repo: Arc<dyn Repository>, queue: Arc<dyn Queue>, handlers: HandlerRegistry) -> Self {
        let guard = Guard::new(repo.clone());
        Self {
            repo,
            queue,
            handlers,
            guard,
        }
    }

    /// Process `case_id` for a delivery at `expected_stage`
    pub async fn process_case(&self, case_id: &CaseId, expected_stage: Stage) -> ProcessReport {
        let case = match self.guard.load(case_id).await {
            Ok(case) => case,
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(case_id = %case_id, stage = %expected_stage, "Case not found; dropping delivery");
                return ProcessReport::NotFound;
            }
            Err(e) => {
                tracing::warn!(case_id = %case_id, stage = %expected_stage, error = %e, "Failed to load case");
                return ProcessReport::LoadFailed {
                    error: e.to_string(),
                };
            }
        };

        if let Eligibility::Skip(reason) = check_eligible(&case, expected_stage) {
            tracing::debug!(
                case_id = %case_id,
                stage = %expected_stage,
                status = %case.status,
                reason = %reason,
                "Skipping delivery"
            );
            return ProcessReport::Skipped(reason);
        }

        let Some(case) = self.guard.claim(&case).await else {
            return ProcessReport::Skipped(SkipReason::Superseded);
        };

        let verdict = self.invoke(&case).await;
        let plan = transition::plan(&case, &verdict);
        self.apply(&case, plan).await
    }

    /// Run the stage handler, converting errors and panics into a fatal verdict
    async fn invoke(&self, case: &Case) -> HandlerVerdict {
        let Some(handler) = self.handlers.get(case.stage) else {
            return HandlerVerdict::Fatal(format!("no handler registered for stage {}", case.stage));
        };

        match AssertUnwindSafe(handler.handle(case)).catch_unwind().await {
            Ok(Ok(outcome)) => HandlerVerdict::Outcome(outcome),
            Ok(Err(e)) => HandlerVerdict::Fatal(e.to_string()),
            Err(panic) => HandlerVerdict::Fatal(format!(
                "stage handler panicked: {}",
                panic_message(panic.as_ref())
            )),
        }
    }

    async fn apply(&self, case: &Case, plan: TransitionPlan) -> ProcessReport {
        let TransitionPlan {
            transition,
            patch,
            events,
            approval,
            enqueue,
        } = plan;

        match self.repo.update_case(&case.id, case.version, &patch).await {
            Ok(_) => {}
            Err(StorageError::Conflict(reason)) => {
                tracing::warn!(
                    case_id = %case.id,
                    stage = %case.stage,
                    reason = %reason,
                    ?transition,
                    "Case changed underneath this delivery; discarding transition"
                );
                return ProcessReport::Superseded { transition };
            }
            Err(e) => {
                tracing::warn!(
                    case_id = %case.id,
                    stage = %case.stage,
                    error = %e,
                    "Failed to write case transition"
                );
            }
        }

        if let Some(approval) = approval {
            best_effort("insert_approval", &case.id, self.repo.insert_approval(approval)).await;
        }
        for event in events {
            best_effort("insert_event", &case.id, self.repo.insert_event(event)).await;
        }

        let scheduled = match enqueue {
            Some(next) => match self.queue.enqueue(&case.id, next).await {
                Ok(handle) => {
                    tracing::debug!(case_id = %case.id, stage = %next, job_id = %handle.id, "Next stage enqueued");
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        case_id = %case.id,
                        stage = %next,
                        error = %e,
                        "Enqueue failed; case is positioned but not scheduled"
                    );
                    false
                }
            },
            None => false,
        };

        log_transition(case, &transition);
        ProcessReport::Applied {
            transition,
            scheduled,
        }
    }
}

fn log_transition(case: &Case, transition: &Transition) {
    match transition {
        Transition::Failed { stage, error } => {
            tracing::error!(case_id = %case.id, org_id = %case.org_id, stage = %stage, error = %error, "Stage handler failed; case failed");
        }
        Transition::Retrying { stage, attempt } => {
            tracing::warn!(case_id = %case.id, stage = %stage, attempt, max_retries = case.max_retries, "Stage reported an error; will retry");
        }
        Transition::Escalated { stage, attempts } => {
            tracing::warn!(case_id = %case.id, org_id = %case.org_id, stage = %stage, attempts, "Retries exhausted; case escalated");
        }
        Transition::AwaitingApproval { stage } => {
            tracing::info!(case_id = %case.id, stage = %stage, "Stage requested human approval");
        }
        Transition::Gated { from, to } => {
            tracing::info!(case_id = %case.id, from = %from, to = %to, "Entered risk-gated review stage");
        }
        Transition::Advanced { from, to } => {
            tracing::info!(case_id = %case.id, from = %from, to = %to, "Case advanced");
        }
        Transition::Completed { stage } => {
            tracing::info!(case_id = %case.id, org_id = %case.org_id, stage = %stage, "Case completed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
