//! Leave request repositories: the request itself plus its owned day rows
//! and comments.

use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::leave_request::{
    LeaveRequest, LeaveRequestComment, LeaveRequestDate, LeaveRequestStatus,
};
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_soft_deleted, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::{LeaveRequestCommentId, LeaveRequestDateId, LeaveRequestId, UserId};

const TABLE_NAME: &str = "leave_requests";
const SELECT_COLUMNS: &str = "id, request_number, user_id, leave_type_id, policy_id, start_date, \
end_date, total_days, reason, status, current_workflow_step, submitted_at, decided_at, \
decided_by, decision_remarks, cancelled_at, cancelled_by, cancellation_reason, created_at, \
updated_at, is_deleted, deleted_at";

const DATE_TABLE: &str = "leave_request_dates";
const DATE_COLUMNS: &str = "id, leave_request_id, leave_date, day_value, is_holiday, is_weekend, \
holiday_name, created_at, updated_at, is_deleted, deleted_at";

const COMMENT_TABLE: &str = "leave_request_comments";
const COMMENT_COLUMNS: &str = "id, leave_request_id, user_id, comment, is_internal, created_at, \
updated_at, is_deleted, deleted_at";

/// Optional filters for listing and counting leave requests.
#[derive(Debug, Default, Clone)]
pub struct LeaveRequestFilters {
    pub user_id: Option<UserId>,
    pub statuses: Vec<LeaveRequestStatus>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveRequestRepository;

impl LeaveRequestRepository {
    pub fn new() -> Self {
        Self
    }

    /// Requests of one user that still occupy the calendar and intersect
    /// the inclusive window `[start, end]`.
    pub async fn find_overlaps(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND is_deleted = FALSE \
             AND status IN ('draft', 'pending_approval', 'approved') \
             AND start_date <= $3 AND end_date >= $2 \
             ORDER BY start_date",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Loads a request under a row lock, failing when it does not exist.
    ///
    /// Every mutating path locks the request before reading its balance;
    /// this is the first half of the fixed two-stage locking order.
    pub async fn get_required_for_update(
        &self,
        conn: &mut PgConnection,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
            SELECT_COLUMNS, TABLE_NAME
        );
        sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::EntityNotFound {
                entity_type: "LeaveRequest".into(),
                entity_id: id.to_string(),
            })
    }

    pub async fn find_by_user(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(user_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Filtered listing, newest first, limit capped.
    pub async fn list_filtered(
        &self,
        conn: &mut PgConnection,
        filters: &LeaveRequestFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME));
        apply_filters(&mut builder, filters);
        builder.push(" ORDER BY created_at DESC, id DESC");
        builder
            .push(" LIMIT ")
            .push_bind(effective_limit(limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<LeaveRequest>()
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Count matching the same filters as [`list_filtered`].
    pub async fn count_filtered(
        &self,
        conn: &mut PgConnection,
        filters: &LeaveRequestFilters,
    ) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", TABLE_NAME));
        apply_filters(&mut builder, filters);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(conn)
            .await?;
        Ok(count)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeaveRequest,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequest, AppError> {
        let query = format!(
            "INSERT INTO {} (id, request_number, user_id, leave_type_id, policy_id, start_date, \
             end_date, total_days, reason, status, current_workflow_step, submitted_at, \
             decided_at, decided_by, decision_remarks, cancelled_at, cancelled_by, \
             cancellation_reason, created_at, updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(item.id)
            .bind(&item.request_number)
            .bind(item.user_id)
            .bind(item.leave_type_id)
            .bind(item.policy_id)
            .bind(item.start_date)
            .bind(item.end_date)
            .bind(item.total_days)
            .bind(&item.reason)
            .bind(item.status.db_value())
            .bind(item.current_workflow_step)
            .bind(item.submitted_at)
            .bind(item.decided_at)
            .bind(item.decided_by)
            .bind(&item.decision_remarks)
            .bind(item.cancelled_at)
            .bind(item.cancelled_by)
            .bind(&item.cancellation_reason)
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
        before: &LeaveRequest,
        item: &LeaveRequest,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequest, AppError> {
        let query = format!(
            "UPDATE {} SET status = $2, current_workflow_step = $3, submitted_at = $4, \
             decided_at = $5, decided_by = $6, decision_remarks = $7, cancelled_at = $8, \
             cancelled_by = $9, cancellation_reason = $10, reason = $11, updated_at = $12 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(item.id)
            .bind(item.status.db_value())
            .bind(item.current_workflow_step)
            .bind(item.submitted_at)
            .bind(item.decided_at)
            .bind(item.decided_by)
            .bind(&item.decision_remarks)
            .bind(item.cancelled_at)
            .bind(item.cancelled_by)
            .bind(&item.cancellation_reason)
            .bind(&item.reason)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }

    /// Soft-deletes a request together with its owned day rows and steps.
    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &LeaveRequest,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequest, AppError> {
        let date_repo = LeaveRequestDateRepository::new();
        for day in date_repo.list_for_request(&mut *conn, item.id).await? {
            date_repo
                .soft_delete(&mut *conn, &day, ctx, Some("Soft-delete owned day row"))
                .await?;
        }

        let step_repo = crate::repositories::workflow::WorkflowStepRepository::new();
        for step in step_repo.list_for_request(&mut *conn, item.id).await? {
            step_repo
                .soft_delete(&mut *conn, &step, ctx, Some("Soft-delete owned workflow step"))
                .await?;
        }

        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

fn apply_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &LeaveRequestFilters) {
    builder.push(" WHERE is_deleted = FALSE");
    if let Some(user_id) = filters.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if !filters.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &filters.statuses {
            separated.push_bind(status.db_value());
        }
        builder.push(")");
    }
}

impl Repository<LeaveRequest> for LeaveRequestRepository {
    const TABLE: &'static str = TABLE_NAME;
    const ENTITY: &'static str = "LeaveRequest";
    type Id = LeaveRequestId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, LeaveRequest>(&query)
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
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, LeaveRequest>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveRequestDateRepository;

impl LeaveRequestDateRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_request(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
    ) -> Result<Vec<LeaveRequestDate>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE leave_request_id = $1 AND is_deleted = FALSE \
             ORDER BY leave_date",
            DATE_COLUMNS, DATE_TABLE
        );
        let rows = sqlx::query_as::<_, LeaveRequestDate>(&query)
            .bind(leave_request_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeaveRequestDate,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequestDate, AppError> {
        let query = format!(
            "INSERT INTO {} (id, leave_request_id, leave_date, day_value, is_holiday, is_weekend, \
             holiday_name, created_at, updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            DATE_TABLE, DATE_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequestDate>(&query)
            .bind(item.id)
            .bind(item.leave_request_id)
            .bind(item.leave_date)
            .bind(item.day_value)
            .bind(item.is_holiday)
            .bind(item.is_weekend)
            .bind(&item.holiday_name)
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
        item: &LeaveRequestDate,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequestDate, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            DATE_TABLE, DATE_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequestDate>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<LeaveRequestDate> for LeaveRequestDateRepository {
    const TABLE: &'static str = DATE_TABLE;
    const ENTITY: &'static str = "LeaveRequestDate";
    type Id = LeaveRequestDateId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeaveRequestDateId,
    ) -> Result<Option<LeaveRequestDate>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            DATE_COLUMNS, DATE_TABLE
        );
        let row = sqlx::query_as::<_, LeaveRequestDate>(&query)
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
    ) -> Result<Vec<LeaveRequestDate>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY leave_date LIMIT $1 OFFSET $2",
            DATE_COLUMNS, DATE_TABLE
        );
        let rows = sqlx::query_as::<_, LeaveRequestDate>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveRequestCommentRepository;

impl LeaveRequestCommentRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_request(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
    ) -> Result<Vec<LeaveRequestComment>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE leave_request_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at",
            COMMENT_COLUMNS, COMMENT_TABLE
        );
        let rows = sqlx::query_as::<_, LeaveRequestComment>(&query)
            .bind(leave_request_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &LeaveRequestComment,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<LeaveRequestComment, AppError> {
        let query = format!(
            "INSERT INTO {} (id, leave_request_id, user_id, comment, is_internal, created_at, \
             updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            COMMENT_TABLE, COMMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, LeaveRequestComment>(&query)
            .bind(item.id)
            .bind(item.leave_request_id)
            .bind(item.user_id)
            .bind(&item.comment)
            .bind(item.is_internal)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.is_deleted)
            .bind(item.deleted_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_created(conn, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<LeaveRequestComment> for LeaveRequestCommentRepository {
    const TABLE: &'static str = COMMENT_TABLE;
    const ENTITY: &'static str = "LeaveRequestComment";
    type Id = LeaveRequestCommentId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: LeaveRequestCommentId,
    ) -> Result<Option<LeaveRequestComment>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            COMMENT_COLUMNS, COMMENT_TABLE
        );
        let row = sqlx::query_as::<_, LeaveRequestComment>(&query)
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
    ) -> Result<Vec<LeaveRequestComment>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2",
            COMMENT_COLUMNS, COMMENT_TABLE
        );
        let rows = sqlx::query_as::<_, LeaveRequestComment>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_request_select_columns_include_workflow_tracking() {
        assert!(SELECT_COLUMNS.contains("current_workflow_step"));
        assert!(SELECT_COLUMNS.contains("decided_by"));
        assert!(SELECT_COLUMNS.contains("cancellation_reason"));
    }

    #[test]
    fn filters_default_to_no_constraints() {
        let filters = LeaveRequestFilters::default();
        assert!(filters.user_id.is_none());
        assert!(filters.statuses.is_empty());
    }
}
