//! Leave policy repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_policy::LeavePolicy;
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_soft_deleted, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::{LeavePolicyId, LeaveTypeId, OrganizationId};

const TABLE_NAME: &str = "leave_policies";
const SELECT_COLUMNS: &str = "id, organization_id, leave_type_id, code, name, description, \
effective_from, effective_to, accrual_frequency, accrual_amount, accrual_cap, carry_forward_type, \
carry_forward_limit, eligibility_type, eligibility_tenure_days, eligibility_rules, \
allow_negative_balance, negative_balance_limit, include_weekends, include_holidays, \
encashment_allowed, encashment_max_days, is_active, created_at, updated_at, is_deleted, deleted_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct LeavePolicyRepository;

impl LeavePolicyRepository {
    pub fn new() -> Self {
        Self
    }

    /// Active policies for a leave type whose effective window covers the
    /// instant, most recently effective first; ties break on id for
    /// deterministic resolution.
    pub async fn list_active_for_leave_type(
        &self,
        conn: &mut PgConnection,
        organization_id: OrganizationId,
        leave_type_id: LeaveTypeId,
        at: DateTime<Utc>,
    ) -> Result<Vec<LeavePolicy>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE organization_id = $1 AND leave_type_id = $2 \
             AND is_active = TRUE AND is_deleted = FALSE \
             AND effective_from <= $3 AND (effective_to IS NULL OR effective_to >= $3) \
             ORDER BY effective_from DESC, id ASC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeavePolicy>(&query)
            .bind(organization_id)
            .bind(leave_type_id)
            .bind(at)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeavePolicy,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeavePolicy, AppError> {
        let query = format!(
            "INSERT INTO {} (id, organization_id, leave_type_id, code, name, description, \
             effective_from, effective_to, accrual_frequency, accrual_amount, accrual_cap, \
             carry_forward_type, carry_forward_limit, eligibility_type, eligibility_tenure_days, \
             eligibility_rules, allow_negative_balance, negative_balance_limit, include_weekends, \
             include_holidays, encashment_allowed, encashment_max_days, is_active, created_at, \
             updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeavePolicy>(&query)
            .bind(item.id)
            .bind(item.organization_id)
            .bind(item.leave_type_id)
            .bind(&item.code)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.effective_from)
            .bind(item.effective_to)
            .bind(item.accrual_frequency.db_value())
            .bind(item.accrual_amount)
            .bind(item.accrual_cap)
            .bind(item.carry_forward_type.db_value())
            .bind(item.carry_forward_limit)
            .bind(item.eligibility_type.db_value())
            .bind(item.eligibility_tenure_days)
            .bind(&item.eligibility_rules)
            .bind(item.allow_negative_balance)
            .bind(item.negative_balance_limit)
            .bind(item.include_weekends)
            .bind(item.include_holidays)
            .bind(item.encashment_allowed)
            .bind(item.encashment_max_days)
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

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        before: &LeavePolicy,
        item: &LeavePolicy,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeavePolicy, AppError> {
        let query = format!(
            "UPDATE {} SET code = $2, name = $3, description = $4, effective_from = $5, \
             effective_to = $6, accrual_frequency = $7, accrual_amount = $8, accrual_cap = $9, \
             carry_forward_type = $10, carry_forward_limit = $11, eligibility_type = $12, \
             eligibility_tenure_days = $13, eligibility_rules = $14, allow_negative_balance = $15, \
             negative_balance_limit = $16, include_weekends = $17, include_holidays = $18, \
             encashment_allowed = $19, encashment_max_days = $20, is_active = $21, \
             updated_at = $22 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeavePolicy>(&query)
            .bind(item.id)
            .bind(&item.code)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.effective_from)
            .bind(item.effective_to)
            .bind(item.accrual_frequency.db_value())
            .bind(item.accrual_amount)
            .bind(item.accrual_cap)
            .bind(item.carry_forward_type.db_value())
            .bind(item.carry_forward_limit)
            .bind(item.eligibility_type.db_value())
            .bind(item.eligibility_tenure_days)
            .bind(&item.eligibility_rules)
            .bind(item.allow_negative_balance)
            .bind(item.negative_balance_limit)
            .bind(item.include_weekends)
            .bind(item.include_holidays)
            .bind(item.encashment_allowed)
            .bind(item.encashment_max_days)
            .bind(item.is_active)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }

    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &LeavePolicy,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeavePolicy, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeavePolicy>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<LeavePolicy> for LeavePolicyRepository {
    const TABLE: &'static str = TABLE_NAME;
    const ENTITY: &'static str = "LeavePolicy";
    type Id = LeavePolicyId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeavePolicyId,
    ) -> Result<Option<LeavePolicy>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeavePolicy>(&query)
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
    ) -> Result<Vec<LeavePolicy>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY effective_from DESC \
             LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeavePolicy>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}
