//! Leave balance repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_balance::LeaveBalance;
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::{LeaveBalanceId, LeaveTypeId, UserId};

const TABLE_NAME: &str = "leave_balances";
const SELECT_COLUMNS: &str = "id, user_id, leave_type_id, policy_id, period_start, period_end, \
opening_balance, accrued, used, pending, adjusted, carried_forward, encashed, expired, \
created_at, updated_at, is_deleted, deleted_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveBalanceRepository;

impl LeaveBalanceRepository {
    pub fn new() -> Self {
        Self
    }

    /// Balance row whose period covers the instant, if any.
    pub async fn find_current(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        leave_type_id: LeaveTypeId,
        at: DateTime<Utc>,
    ) -> Result<Option<LeaveBalance>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND leave_type_id = $2 \
             AND period_start <= $3 AND period_end >= $3 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(user_id)
            .bind(leave_type_id)
            .bind(at)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Same as [`find_current`] but takes a row lock.
    ///
    /// Always acquire the leave request lock before this one; the fixed
    /// lock order avoids deadlocks under concurrent decisions.
    pub async fn find_current_for_update(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        leave_type_id: LeaveTypeId,
        at: DateTime<Utc>,
    ) -> Result<Option<LeaveBalance>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND leave_type_id = $2 \
             AND period_start <= $3 AND period_end >= $3 AND is_deleted = FALSE FOR UPDATE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(user_id)
            .bind(leave_type_id)
            .bind(at)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// All period balances of a user, newest period first.
    pub async fn list_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Vec<LeaveBalance>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY period_start DESC, leave_type_id",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(user_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeaveBalance,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveBalance, AppError> {
        let query = format!(
            "INSERT INTO {} (id, user_id, leave_type_id, policy_id, period_start, period_end, \
             opening_balance, accrued, used, pending, adjusted, carried_forward, encashed, \
             expired, created_at, updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(item.id)
            .bind(item.user_id)
            .bind(item.leave_type_id)
            .bind(item.policy_id)
            .bind(item.period_start)
            .bind(item.period_end)
            .bind(item.opening_balance)
            .bind(item.accrued)
            .bind(item.used)
            .bind(item.pending)
            .bind(item.adjusted)
            .bind(item.carried_forward)
            .bind(item.encashed)
            .bind(item.expired)
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
        before: &LeaveBalance,
        item: &LeaveBalance,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveBalance, AppError> {
        let query = format!(
            "UPDATE {} SET opening_balance = $2, accrued = $3, used = $4, pending = $5, \
             adjusted = $6, carried_forward = $7, encashed = $8, expired = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(item.id)
            .bind(item.opening_balance)
            .bind(item.accrued)
            .bind(item.used)
            .bind(item.pending)
            .bind(item.adjusted)
            .bind(item.carried_forward)
            .bind(item.encashed)
            .bind(item.expired)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<LeaveBalance> for LeaveBalanceRepository {
    const TABLE: &'static str = TABLE_NAME;
    const ENTITY: &'static str = "LeaveBalance";
    type Id = LeaveBalanceId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeaveBalanceId,
    ) -> Result<Option<LeaveBalance>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveBalance>(&query)
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
    ) -> Result<Vec<LeaveBalance>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY period_start DESC \
             LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveBalance>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}
