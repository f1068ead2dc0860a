//! Workflow repositories: configurations and per-request step instances.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::workflow::{WorkflowConfiguration, WorkflowStep};
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_soft_deleted, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::{LeaveRequestId, OrganizationId, WorkflowConfigurationId, WorkflowStepId};

const CONFIG_TABLE: &str = "workflow_configurations";
const CONFIG_COLUMNS: &str = "id, organization_id, code, name, description, criteria, priority, \
effective_from, effective_to, is_active, created_at, updated_at, is_deleted, deleted_at";

const STEP_TABLE: &str = "workflow_steps";
const STEP_COLUMNS: &str = "id, leave_request_id, step_order, step_name, approver_id, status, \
actioned_at, action_remarks, created_at, updated_at, is_deleted, deleted_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowConfigurationRepository;

impl WorkflowConfigurationRepository {
    pub fn new() -> Self {
        Self
    }

    /// Active workflows for an organization effective at the instant,
    /// highest priority first; ties break on id for determinism.
    pub async fn list_active_for_org(
        &self,
        conn: &mut PgConnection,
        organization_id: OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<Vec<WorkflowConfiguration>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE organization_id = $1 AND is_active = TRUE \
             AND is_deleted = FALSE AND effective_from <= $2 \
             AND (effective_to IS NULL OR effective_to >= $2) \
             ORDER BY priority DESC, id ASC",
            CONFIG_COLUMNS, CONFIG_TABLE
        );
        let rows = sqlx::query_as::<_, WorkflowConfiguration>(&query)
            .bind(organization_id)
            .bind(at)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &WorkflowConfiguration,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<WorkflowConfiguration, AppError> {
        let query = format!(
            "INSERT INTO {} (id, organization_id, code, name, description, criteria, priority, \
             effective_from, effective_to, is_active, created_at, updated_at, is_deleted, \
             deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            CONFIG_TABLE, CONFIG_COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowConfiguration>(&query)
            .bind(item.id)
            .bind(item.organization_id)
            .bind(&item.code)
            .bind(&item.name)
            .bind(&item.description)
            .bind(&item.criteria)
            .bind(item.priority)
            .bind(item.effective_from)
            .bind(item.effective_to)
            .bind(item.is_active)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.is_deleted)
            .bind(item.deleted_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_created(conn, &row, ctx, description).await?;
        Ok(row)
    }

    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &WorkflowConfiguration,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<WorkflowConfiguration, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            CONFIG_TABLE, CONFIG_COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowConfiguration>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<WorkflowConfiguration> for WorkflowConfigurationRepository {
    const TABLE: &'static str = CONFIG_TABLE;
    const ENTITY: &'static str = "WorkflowConfiguration";
    type Id = WorkflowConfigurationId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: WorkflowConfigurationId,
    ) -> Result<Option<WorkflowConfiguration>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            CONFIG_COLUMNS, CONFIG_TABLE
        );
        let row = sqlx::query_as::<_, WorkflowConfiguration>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        conn: &mut PgConnection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkflowConfiguration>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY priority DESC \
             LIMIT $1 OFFSET $2",
            CONFIG_COLUMNS, CONFIG_TABLE
        );
        let rows = sqlx::query_as::<_, WorkflowConfiguration>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowStepRepository;

impl WorkflowStepRepository {
    pub fn new() -> Self {
        Self
    }

    /// All steps of a request sorted by `step_order` ascending.
    pub async fn list_for_request(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
    ) -> Result<Vec<WorkflowStep>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE leave_request_id = $1 AND is_deleted = FALSE \
             ORDER BY step_order ASC",
            STEP_COLUMNS, STEP_TABLE
        );
        let rows = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(leave_request_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Steps of a request still awaiting an outcome (queued or pending).
    pub async fn list_open_for_request(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
    ) -> Result<Vec<WorkflowStep>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE leave_request_id = $1 AND is_deleted = FALSE \
             AND status IN ('queued', 'pending') ORDER BY step_order ASC",
            STEP_COLUMNS, STEP_TABLE
        );
        let rows = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(leave_request_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &WorkflowStep,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<WorkflowStep, AppError> {
        let query = format!(
            "INSERT INTO {} (id, leave_request_id, step_order, step_name, approver_id, status, \
             actioned_at, action_remarks, created_at, updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            STEP_TABLE, STEP_COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(item.id)
            .bind(item.leave_request_id)
            .bind(item.step_order)
            .bind(&item.step_name)
            .bind(item.approver_id)
            .bind(item.status.db_value())
            .bind(item.actioned_at)
            .bind(&item.action_remarks)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.is_deleted)
            .bind(item.deleted_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_created(conn, &row, ctx, description).await?;
        Ok(row)
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        before: &WorkflowStep,
        item: &WorkflowStep,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<WorkflowStep, AppError> {
        let query = format!(
            "UPDATE {} SET status = $2, actioned_at = $3, action_remarks = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {}",
            STEP_TABLE, STEP_COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(item.id)
            .bind(item.status.db_value())
            .bind(item.actioned_at)
            .bind(&item.action_remarks)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }

    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &WorkflowStep,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<WorkflowStep, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            STEP_TABLE, STEP_COLUMNS
        );
        let row = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<WorkflowStep> for WorkflowStepRepository {
    const TABLE: &'static str = STEP_TABLE;
    const ENTITY: &'static str = "WorkflowStep";
    type Id = WorkflowStepId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: WorkflowStepId,
    ) -> Result<Option<WorkflowStep>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            STEP_COLUMNS, STEP_TABLE
        );
        let row = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    async fn list(
        &self,
        conn: &mut PgConnection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkflowStep>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2",
            STEP_COLUMNS, STEP_TABLE
        );
        let rows = sqlx::query_as::<_, WorkflowStep>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}
