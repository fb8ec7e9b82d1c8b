//! Row decoding

use casework_engine::{StorageError, StorageResult};
use casework_types::{
    Approval, ApprovalId, Case, CaseEvent, CaseId, EventId, OrgId, RiskFlag, TypesError,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use sqlx::postgres::PgRow;
use sqlx::Row;

fn column<'r, T>(row: &'r PgRow, name: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::Query(format!("column {}: {}", name, e)))
}

fn parsed<T>(row: &PgRow, name: &str) -> StorageResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e: T::Err| StorageError::InvalidData(format!("column {}: {}", name, e)))
}

fn unsigned(row: &PgRow, name: &str) -> StorageResult<u32> {
    let value: i32 = column(row, name)?;
    u32::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("column {} is negative: {}", name, value)))
}

pub(crate) fn case_from_row(row: &PgRow) -> StorageResult<Case> {
    let flags: Vec<String> = column(row, "risk_flags")?;
    let risk_flags = flags
        .into_iter()
        .map(RiskFlag::new)
        .collect::<Result<BTreeSet<RiskFlag>, TypesError>>()
        .map_err(|e| StorageError::InvalidData(e.to_string()))?;
    let version: i64 = column(row, "version")?;

    Ok(Case {
        id: CaseId(column(row, "id")?),
        org_id: OrgId(column(row, "org_id")?),
        stage: parsed(row, "stage")?,
        status: parsed(row, "status")?,
        retry_count: unsigned(row, "retry_count")?,
        max_retries: unsigned(row, "max_retries")?,
        risk_flags,
        title: column(row, "title")?,
        description: column(row, "description")?,
        severity: column(row, "severity")?,
        area: column(row, "area")?,
        metadata: column(row, "metadata")?,
        version: version as u64,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

pub(crate) fn event_from_row(row: &PgRow) -> StorageResult<CaseEvent> {
    Ok(CaseEvent {
        id: EventId(column(row, "id")?),
        case_id: CaseId(column(row, "case_id")?),
        org_id: OrgId(column(row, "org_id")?),
        stage: parsed(row, "stage")?,
        event_type: parsed(row, "event_type")?,
        actor: column(row, "actor")?,
        summary: column(row, "summary")?,
        details: column(row, "details")?,
        created_at: column(row, "created_at")?,
    })
}

pub(crate) fn approval_from_row(row: &PgRow) -> StorageResult<Approval> {
    Ok(Approval {
        id: ApprovalId(column(row, "id")?),
        case_id: CaseId(column(row, "case_id")?),
        org_id: OrgId(column(row, "org_id")?),
        stage: parsed(row, "stage")?,
        gate_type: column(row, "gate_type")?,
        status: parsed(row, "status")?,
        decided_by: column(row, "decided_by")?,
        decided_at: column(row, "decided_at")?,
        created_at: column(row, "created_at")?,
    })
}
