//! Append-only audit records
//!
//! One [`CaseEvent`] is written per engine decision. Events are never
//! updated or deleted.

use crate::case::{Case, CaseId, OrgId};
use crate::error::TypesError;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Actor recorded on events written by the engine itself
pub const ENGINE_ACTOR: &str = "orchestrator";

/// Unique identifier for an audit event
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of engine decision an event records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StageEnter,
    StageExit,
    Error,
    Escalation,
    ApprovalRequest,
    ApprovalGranted,
    ApprovalRejected,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::StageEnter => "stage_enter",
            EventType::StageExit => "stage_exit",
            EventType::Error => "error",
            EventType::Escalation => "escalation",
            EventType::ApprovalRequest => "approval_request",
            EventType::ApprovalGranted => "approval_granted",
            EventType::ApprovalRejected => "approval_rejected",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage_enter" => Ok(EventType::StageEnter),
            "stage_exit" => Ok(EventType::StageExit),
            "error" => Ok(EventType::Error),
            "escalation" => Ok(EventType::Escalation),
            "approval_request" => Ok(EventType::ApprovalRequest),
            "approval_granted" => Ok(EventType::ApprovalGranted),
            "approval_rejected" => Ok(EventType::ApprovalRejected),
            other => Err(TypesError::UnknownEventType(other.to_string())),
        }
    }
}

/// An audit record of one engine decision on a case
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseEvent {
    pub id: EventId,
    pub case_id: CaseId,
    pub org_id: OrgId,
    pub stage: Stage,
    pub event_type: EventType,
    pub actor: String,
    pub summary: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CaseEvent {
    /// A new engine-authored event for `case` at `stage`
    pub fn new(case: &Case, stage: Stage, event_type: EventType, summary: impl Into<String>) -> Self {
        Self {
            id: EventId::generate(),
            case_id: case.id.clone(),
            org_id: case.org_id.clone(),
            stage,
            event_type,
            actor: ENGINE_ACTOR.to_string(),
            summary: summary.into(),
            details: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
