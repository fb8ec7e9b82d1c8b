//! Cases: the unit of work driven through the stage table
//!
//! A [`Case`] is always handled as an immutable snapshot. Changes are
//! expressed as a [`CasePatch`] and applied by the repository, guarded by
//! the case `version`.

use crate::error::TypesError;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Retry budget given to a case when none is specified
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a case
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant that owns a case
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Processing status of a case at its current stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    InProgress,
    NeedsHuman,
    Completed,
    Failed,
    Cancelled,
}

impl CaseStatus {
    /// Terminal cases are never processed again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CaseStatus::Completed | CaseStatus::Failed | CaseStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::NeedsHuman => "needs_human",
            CaseStatus::Completed => "completed",
            CaseStatus::Failed => "failed",
            CaseStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CaseStatus::Open),
            "in_progress" => Ok(CaseStatus::InProgress),
            "needs_human" => Ok(CaseStatus::NeedsHuman),
            "completed" => Ok(CaseStatus::Completed),
            "failed" => Ok(CaseStatus::Failed),
            "cancelled" => Ok(CaseStatus::Cancelled),
            other => Err(TypesError::UnknownStatus(other.to_string())),
        }
    }
}

// ── Risk Flags ───────────────────────────────────────────────────────

/// A tag marking a sensitive change category on a case
///
/// Flags are compared case-insensitively; the stored form is trimmed
/// lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RiskFlag(String);

impl RiskFlag {
    pub fn new(tag: impl AsRef<str>) -> Result<Self, TypesError> {
        let normalized = tag.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(TypesError::InvalidRiskFlag(tag.as_ref().to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RiskFlag {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RiskFlag::new(value)
    }
}

impl From<RiskFlag> for String {
    fn from(flag: RiskFlag) -> Self {
        flag.0
    }
}

impl FromStr for RiskFlag {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskFlag::new(s)
    }
}

impl std::fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Case ─────────────────────────────────────────────────────────────

/// A support or bug-fix case
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub org_id: OrgId,
    /// Current stage; only the engine moves this
    pub stage: Stage,
    pub status: CaseStatus,
    pub retry_count: u32,
    /// Retry budget, counted per stage
    pub max_retries: u32,
    #[serde(default)]
    pub risk_flags: BTreeSet<RiskFlag>,

    // Fields owned by other subsystems
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Bumped by every successful update; the compare-and-swap token
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// A new case at `intake/open` with a fresh id
    pub fn new(org_id: OrgId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CaseId::generate(),
            org_id,
            stage: Stage::FIRST,
            status: CaseStatus::Open,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            risk_flags: BTreeSet::new(),
            title: title.into(),
            description: None,
            severity: None,
            area: None,
            metadata: serde_json::Value::Null,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: CaseId) -> Self {
        self.id = id;
        self
    }

    pub fn with_risk_flag(mut self, flag: RiskFlag) -> Self {
        self.risk_flags.insert(flag);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// Position the case at an arbitrary stage/status. Used when seeding
    /// cases from external systems and in tests.
    pub fn positioned(mut self, stage: Stage, status: CaseStatus) -> Self {
        self.stage = stage;
        self.status = status;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

// ── Patch ────────────────────────────────────────────────────────────

/// A typed, partial update to the workflow fields of a case
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl CasePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn status(mut self, status: CaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_none() && self.status.is_none() && self.retry_count.is_none()
    }

    /// Apply the patch to a snapshot, bumping `version` and `updated_at`
    pub fn apply_to(&self, case: &mut Case) {
        if let Some(stage) = self.stage {
            case.stage = stage;
        }
        if let Some(status) = self.status {
            case.status = status;
        }
        if let Some(retry_count) = self.retry_count {
            case.retry_count = retry_count;
        }
        case.version += 1;
        case.updated_at = Utc::now();
    }
}
