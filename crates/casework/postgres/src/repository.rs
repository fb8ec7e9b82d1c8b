//! PostgreSQL repository implementation

use crate::rows::{approval_from_row, case_from_row, event_from_row};
use async_trait::async_trait;
use casework_engine::{
    ApprovalStorage, CaseStorage, EventStorage, StorageError, StorageResult,
};
use casework_types::{
    Approval, ApprovalDecision, ApprovalId, ApprovalStatus, Case, CaseEvent, CaseId, CasePatch,
    CaseStatus,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

const CASE_COLUMNS: &str = "id, org_id, stage, status, retry_count, max_retries, risk_flags, \
     title, description, severity, area, metadata, version, created_at, updated_at";

/// PostgreSQL-backed repository
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Connect to PostgreSQL and initialize schema
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let repo = Self { pool };
        repo.initialize_schema().await?;
        Ok(repo)
    }

    /// Wrap an existing pool. The schema is assumed to exist.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn initialize_schema(&self) -> StorageResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                status TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL,
                risk_flags TEXT[] NOT NULL DEFAULT '{}',
                title TEXT NOT NULL,
                description TEXT,
                severity TEXT,
                area TEXT,
                metadata JSONB NOT NULL DEFAULT 'null',
                version BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS cases_status_updated ON cases(status, updated_at);"#,
            r#"CREATE INDEX IF NOT EXISTS cases_org_id ON cases(org_id);"#,
            r#"
            CREATE TABLE IF NOT EXISTS case_events (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                case_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                event_type TEXT NOT NULL,
                actor TEXT NOT NULL,
                summary TEXT NOT NULL,
                details JSONB NOT NULL DEFAULT 'null',
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS case_events_case_id ON case_events(case_id, seq);"#,
            r#"
            CREATE TABLE IF NOT EXISTS case_approvals (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                gate_type TEXT NOT NULL,
                status TEXT NOT NULL,
                decided_by TEXT,
                decided_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS case_approvals_case_id ON case_approvals(case_id);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        tracing::info!("Casework schema initialized");
        Ok(())
    }

    async fn case_version(&self, id: &CaseId) -> StorageResult<Option<i64>> {
        let row = sqlx::query("SELECT version FROM cases WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(|r| r.try_get::<i64, _>("version"))
            .transpose()
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}

#[async_trait]
impl CaseStorage for PostgresRepository {
    async fn get_case(&self, id: &CaseId) -> StorageResult<Option<Case>> {
        let sql = format!("SELECT {} FROM cases WHERE id = $1", CASE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(case_from_row).transpose()
    }

    async fn insert_case(&self, case: Case) -> StorageResult<()> {
        let flags: Vec<String> = case.risk_flags.iter().map(|f| f.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO cases (id, org_id, stage, status, retry_count, max_retries, risk_flags,
                               title, description, severity, area, metadata, version,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(case.id.as_str())
        .bind(case.org_id.as_str())
        .bind(case.stage.as_str())
        .bind(case.status.as_str())
        .bind(case.retry_count as i32)
        .bind(case.max_retries as i32)
        .bind(flags)
        .bind(&case.title)
        .bind(&case.description)
        .bind(&case.severity)
        .bind(&case.area)
        .bind(&case.metadata)
        .bind(case.version as i64)
        .bind(case.created_at)
        .bind(case.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!("case {} already exists", case.id)));
        }
        Ok(())
    }

    async fn update_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        patch: &CasePatch,
    ) -> StorageResult<u64> {
        let row = sqlx::query(
            r#"
            UPDATE cases SET
                stage = COALESCE($3, stage),
                status = COALESCE($4, status),
                retry_count = COALESCE($5, retry_count),
                version = version + 1,
                updated_at = $6
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(id.as_str())
        .bind(expected_version as i64)
        .bind(patch.stage.map(|s| s.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.retry_count.map(|n| n as i32))
        .bind(chrono::Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if let Some(row) = row {
            let version: i64 = row
                .try_get("version")
                .map_err(|e| StorageError::Query(e.to_string()))?;
            return Ok(version as u64);
        }

        match self.case_version(id).await? {
            None => Err(StorageError::NotFound(format!("case {}", id))),
            Some(actual) => {
                tracing::debug!(case_id = %id, expected_version, actual, "Case update lost version check");
                Err(StorageError::Conflict(format!(
                    "case {} is at version {}, expected {}",
                    id, actual, expected_version
                )))
            }
        }
    }

    async fn list_cases_by_status(
        &self,
        status: CaseStatus,
        limit: usize,
    ) -> StorageResult<Vec<Case>> {
        let sql = format!(
            "SELECT {} FROM cases WHERE status = $1 ORDER BY updated_at ASC, id ASC LIMIT $2",
            CASE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(case_from_row).collect()
    }
}

#[async_trait]
impl EventStorage for PostgresRepository {
    async fn insert_event(&self, event: CaseEvent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO case_events (id, case_id, org_id, stage, event_type, actor, summary,
                                     details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&event.id.0)
        .bind(event.case_id.as_str())
        .bind(event.org_id.as_str())
        .bind(event.stage.as_str())
        .bind(event.event_type.as_str())
        .bind(&event.actor)
        .bind(&event.summary)
        .bind(&event.details)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_events(&self, case_id: &CaseId) -> StorageResult<Vec<CaseEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, case_id, org_id, stage, event_type, actor, summary, details, created_at
            FROM case_events WHERE case_id = $1 ORDER BY seq ASC
            "#,
        )
        .bind(case_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl ApprovalStorage for PostgresRepository {
    async fn insert_approval(&self, approval: Approval) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO case_approvals (id, case_id, org_id, stage, gate_type, status,
                                        decided_by, decided_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&approval.id.0)
        .bind(approval.case_id.as_str())
        .bind(approval.org_id.as_str())
        .bind(approval.stage.as_str())
        .bind(&approval.gate_type)
        .bind(approval.status.as_str())
        .bind(&approval.decided_by)
        .bind(approval.decided_at)
        .bind(approval.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_approval(&self, id: &ApprovalId) -> StorageResult<Option<Approval>> {
        let row = sqlx::query(
            r#"
            SELECT id, case_id, org_id, stage, gate_type, status, decided_by, decided_at, created_at
            FROM case_approvals WHERE id = $1
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(approval_from_row).transpose()
    }

    async fn decide_approval(
        &self,
        id: &ApprovalId,
        decision: ApprovalDecision,
        decided_by: &str,
    ) -> StorageResult<Approval> {
        let status: ApprovalStatus = decision.into();
        let row = sqlx::query(
            r#"
            UPDATE case_approvals
            SET status = $2, decided_by = $3, decided_at = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING id, case_id, org_id, stage, gate_type, status, decided_by, decided_at, created_at
            "#,
        )
        .bind(&id.0)
        .bind(status.as_str())
        .bind(decided_by)
        .bind(chrono::Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        match row {
            Some(row) => approval_from_row(&row),
            None => match self.get_approval(id).await? {
                None => Err(StorageError::NotFound(format!("approval {}", id))),
                Some(existing) => {
                    tracing::debug!(approval_id = %id, status = %existing.status, "Approval already decided");
                    Err(StorageError::Conflict(format!(
                        "approval {} is already {}",
                        id, existing.status
                    )))
                }
            },
        }
    }

    async fn list_approvals(&self, case_id: &CaseId) -> StorageResult<Vec<Approval>> {
        let rows = sqlx::query(
            r#"
            SELECT id, case_id, org_id, stage, gate_type, status, decided_by, decided_at, created_at
            FROM case_approvals WHERE case_id = $1 ORDER BY created_at ASC
            "#,
        )
        .bind(case_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(approval_from_row).collect()
    }
}
