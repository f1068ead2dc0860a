//! Leave type repository.

use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_type::LeaveType;
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_soft_deleted, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::{LeaveTypeId, OrganizationId};

const TABLE_NAME: &str = "leave_types";
const SELECT_COLUMNS: &str = "id, organization_id, code, name, description, is_paid, is_active, \
requires_reason, min_days_per_request, max_days_per_request, created_at, updated_at, is_deleted, \
deleted_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveTypeRepository;

impl LeaveTypeRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_code(
        &self,
        conn: &mut PgConnection,
        organization_id: OrganizationId,
        code: &str,
    ) -> Result<Option<LeaveType>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE organization_id = $1 AND code = $2 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveType>(&query)
            .bind(organization_id)
            .bind(code)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Inserts a leave type; `code` must be unique within the organization.
    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeaveType,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveType, AppError> {
        if self
            .find_by_code(&mut *conn, item.organization_id, &item.code)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateEntity {
                entity_type: "LeaveType".into(),
                field: "code".into(),
                value: item.code.clone(),
            });
        }

        let query = format!(
            "INSERT INTO {} (id, organization_id, code, name, description, is_paid, is_active, \
             requires_reason, min_days_per_request, max_days_per_request, created_at, updated_at, \
             is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveType>(&query)
            .bind(item.id)
            .bind(item.organization_id)
            .bind(&item.code)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.is_paid)
            .bind(item.is_active)
            .bind(item.requires_reason)
            .bind(item.min_days_per_request)
            .bind(item.max_days_per_request)
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
        before: &LeaveType,
        item: &LeaveType,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveType, AppError> {
        let query = format!(
            "UPDATE {} SET code = $2, name = $3, description = $4, is_paid = $5, is_active = $6, \
             requires_reason = $7, min_days_per_request = $8, max_days_per_request = $9, \
             updated_at = $10 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveType>(&query)
            .bind(item.id)
            .bind(&item.code)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.is_paid)
            .bind(item.is_active)
            .bind(item.requires_reason)
            .bind(item.min_days_per_request)
            .bind(item.max_days_per_request)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }

    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &LeaveType,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveType, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveType>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<LeaveType> for LeaveTypeRepository {
    const TABLE: &'static str = TABLE_NAME;
    const ENTITY: &'static str = "LeaveType";
    type Id = LeaveTypeId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeaveTypeId,
    ) -> Result<Option<LeaveType>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveType>(&query)
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
    ) -> Result<Vec<LeaveType>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY code LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveType>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}
