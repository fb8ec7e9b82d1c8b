//! Transition engine
//!
//! Interprets a handler's verdict for a case at stage `s` and computes the
//! next workflow position together with every side effect: audit events,
//! an approval row, and the stage to enqueue. Planning is pure; the
//! orchestrator applies the plan.

use crate::risk_gate;
use casework_types::{Approval, Case, CaseEvent, CasePatch, CaseStatus, EventType, Stage, StageOutcome};
use serde_json::json;

/// What the handler invocation produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerVerdict {
    /// The handler returned normally
    Outcome(StageOutcome),
    /// The handler raised an error, panicked, or was missing
    Fatal(String),
}

/// The decision the engine took
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Unrecoverable handler failure
    Failed { stage: Stage, error: String },
    /// Recoverable error; the stage will be redelivered
    Retrying { stage: Stage, attempt: u32 },
    /// Retry budget exhausted
    Escalated { stage: Stage, attempts: u32 },
    /// The handler asked for human sign-off at its own stage
    AwaitingApproval { stage: Stage },
    /// Advanced into a review stage that requires human sign-off
    Gated { from: Stage, to: Stage },
    /// Advanced and scheduled the next stage
    Advanced { from: Stage, to: Stage },
    /// The case finished
    Completed { stage: Stage },
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Transition::Failed { .. } | Transition::Escalated { .. } | Transition::Completed { .. }
        )
    }

    /// Stage to redeliver after a recoverable error
    pub fn redelivery(&self) -> Option<Stage> {
        match self {
            Transition::Retrying { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Everything one decision writes
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionPlan {
    pub transition: Transition,
    pub patch: CasePatch,
    pub events: Vec<CaseEvent>,
    pub approval: Option<Approval>,
    pub enqueue: Option<Stage>,
}

impl TransitionPlan {
    fn new(transition: Transition, patch: CasePatch) -> Self {
        Self {
            transition,
            patch,
            events: Vec::new(),
            approval: None,
            enqueue: None,
        }
    }

    fn event(mut self, event: CaseEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// Compute the plan for `case` (currently at `case.stage`) given `verdict`
pub fn plan(case: &Case, verdict: &HandlerVerdict) -> TransitionPlan {
    let stage = case.stage;

    match verdict {
        HandlerVerdict::Fatal(error) => TransitionPlan::new(
            Transition::Failed {
                stage,
                error: error.clone(),
            },
            CasePatch::new().status(CaseStatus::Failed),
        )
        .event(
            CaseEvent::new(case, stage, EventType::Error, error.clone()).with_details(json!({
                "error": error,
                "fatal": true,
                "retry_count": case.retry_count,
            })),
        ),

        HandlerVerdict::Outcome(StageOutcome::Error { error, summary }) => {
            let error_event = CaseEvent::new(case, stage, EventType::Error, summary.clone())
                .with_details(json!({
                    "error": error,
                    "fatal": false,
                    "retry_count": case.retry_count,
                    "max_retries": case.max_retries,
                }));

            if case.retries_exhausted() {
                TransitionPlan::new(
                    Transition::Escalated {
                        stage,
                        attempts: case.retry_count,
                    },
                    CasePatch::new().status(CaseStatus::Failed),
                )
                .event(error_event)
                .event(
                    CaseEvent::new(case, stage, EventType::Escalation, "max retries exceeded")
                        .with_details(json!({
                            "retry_count": case.retry_count,
                            "max_retries": case.max_retries,
                            "last_error": error,
                        })),
                )
            } else {
                let attempt = case.retry_count + 1;
                TransitionPlan::new(
                    Transition::Retrying { stage, attempt },
                    CasePatch::new()
                        .status(CaseStatus::Open)
                        .retry_count(attempt),
                )
                .event(error_event)
            }
        }

        HandlerVerdict::Outcome(StageOutcome::NeedsHuman { summary }) => {
            let approval = Approval::pending(case, stage);
            let mut plan = TransitionPlan::new(
                Transition::AwaitingApproval { stage },
                CasePatch::new().status(CaseStatus::NeedsHuman),
            )
            .event(
                CaseEvent::new(case, stage, EventType::ApprovalRequest, summary.clone())
                    .with_details(json!({
                        "approval_id": approval.id,
                        "gate_type": approval.gate_type,
                    })),
            );
            plan.approval = Some(approval);
            plan
        }

        HandlerVerdict::Outcome(StageOutcome::Advance { summary }) => advance(case, summary),

        HandlerVerdict::Outcome(StageOutcome::Stop { summary }) => TransitionPlan::new(
            Transition::Completed { stage },
            CasePatch::new().status(CaseStatus::Completed),
        )
        .event(CaseEvent::new(case, stage, EventType::StageExit, summary.clone())),
    }
}

fn advance(case: &Case, summary: &str) -> TransitionPlan {
    let stage = case.stage;
    let exit = CaseEvent::new(case, stage, EventType::StageExit, summary.to_string());

    let Some(next) = stage.successor() else {
        return TransitionPlan::new(
            Transition::Completed { stage },
            CasePatch::new().status(CaseStatus::Completed),
        )
        .event(exit);
    };

    if risk_gate::requires_human_gate(next, &case.risk_flags) {
        let approval = Approval::pending(case, next);
        let flags: Vec<&str> = risk_gate::sensitive_flags(&case.risk_flags)
            .into_iter()
            .map(|f| f.as_str())
            .collect();
        let enter = CaseEvent::new(
            case,
            next,
            EventType::StageEnter,
            format!("entered {} pending human approval", next),
        )
        .with_details(json!({
            "from": stage,
            "gated": true,
            "risk_flags": flags,
            "approval_id": approval.id,
        }));

        let mut plan = TransitionPlan::new(
            Transition::Gated { from: stage, to: next },
            CasePatch::new()
                .stage(next)
                .status(CaseStatus::NeedsHuman)
                .retry_count(0),
        )
        .event(exit)
        .event(enter);
        plan.approval = Some(approval);
        return plan;
    }

    let enter = CaseEvent::new(case, next, EventType::StageEnter, format!("entered {}", next))
        .with_details(json!({ "from": stage, "gated": false }));

    let mut plan = TransitionPlan::new(
        Transition::Advanced { from: stage, to: next },
        CasePatch::new()
            .stage(next)
            .status(CaseStatus::Open)
            .retry_count(0),
    )
    .event(exit)
    .event(enter);
    plan.enqueue = Some(next);
    plan
}
