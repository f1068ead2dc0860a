//! User repository.

use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::user::User;
use crate::repositories::audit_context::AuditContext;
use crate::repositories::audit_log::{audit_created, audit_soft_deleted, audit_updated};
use crate::repositories::repository::{effective_limit, Repository};
use crate::types::UserId;

const TABLE_NAME: &str = "users";
const SELECT_COLUMNS: &str = "id, organization_id, employee_id, email, first_name, last_name, \
manager_id, job_title, employment_type, hire_date, probation_end_date, termination_date, status, \
attributes, created_at, updated_at, is_deleted, deleted_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_email(
        &self,
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE email = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn find_by_employee_id(
        &self,
        conn: &mut PgConnection,
        employee_id: &str,
    ) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE employee_id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(employee_id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn add(
        &self,
        conn: &mut PgConnection,
        item: &User,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<User, AppError> {
        let query = format!(
            "INSERT INTO {} (id, organization_id, employee_id, email, first_name, last_name, \
             manager_id, job_title, employment_type, hire_date, probation_end_date, \
             termination_date, status, attributes, created_at, updated_at, is_deleted, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(item.id)
            .bind(item.organization_id)
            .bind(&item.employee_id)
            .bind(&item.email)
            .bind(&item.first_name)
            .bind(&item.last_name)
            .bind(item.manager_id)
            .bind(&item.job_title)
            .bind(&item.employment_type)
            .bind(item.hire_date)
            .bind(item.probation_end_date)
            .bind(item.termination_date)
            .bind(item.status.db_value())
            .bind(&item.attributes)
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.is_deleted)
            .bind(item.deleted_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_created(conn, &row, ctx, description).await?;
        Ok(row)
    }

    /// Adds a user after uniqueness pre-checks on email and employee id.
    pub async fn create_user(
        &self,
        conn: &mut PgConnection,
        user: &User,
        ctx: &AuditContext,
    ) -> Result<User, AppError> {
        if self.find_by_email(&mut *conn, &user.email).await?.is_some() {
            return Err(AppError::DuplicateEntity {
                entity_type: "User".into(),
                field: "email".into(),
                value: user.email.clone(),
            });
        }
        if self
            .find_by_employee_id(&mut *conn, &user.employee_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateEntity {
                entity_type: "User".into(),
                field: "employee_id".into(),
                value: user.employee_id.clone(),
            });
        }
        self.add(conn, user, ctx, Some("Create user")).await
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        before: &User,
        item: &User,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<User, AppError> {
        let query = format!(
            "UPDATE {} SET organization_id = $2, employee_id = $3, email = $4, first_name = $5, \
             last_name = $6, manager_id = $7, job_title = $8, employment_type = $9, \
             hire_date = $10, probation_end_date = $11, termination_date = $12, status = $13, \
             attributes = $14, updated_at = $15 WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(item.id)
            .bind(item.organization_id)
            .bind(&item.employee_id)
            .bind(&item.email)
            .bind(&item.first_name)
            .bind(&item.last_name)
            .bind(item.manager_id)
            .bind(&item.job_title)
            .bind(&item.employment_type)
            .bind(item.hire_date)
            .bind(item.probation_end_date)
            .bind(item.termination_date)
            .bind(item.status.db_value())
            .bind(&item.attributes)
            .bind(item.updated_at)
            .fetch_one(&mut *conn)
            .await?;
        audit_updated(conn, before, &row, ctx, description).await?;
        Ok(row)
    }

    /// Points the user at a new reporting manager.
    pub async fn set_manager(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        manager_id: Option<UserId>,
        ctx: &AuditContext,
    ) -> Result<User, AppError> {
        let before = self.get_required(&mut *conn, user_id).await?;
        let mut after = before.clone();
        after.manager_id = manager_id;
        after.updated_at = chrono::Utc::now();
        self.update(conn, &before, &after, ctx, Some("Set manager"))
            .await
    }

    pub async fn soft_delete(
        &self,
        conn: &mut PgConnection,
        item: &User,
        ctx: &AuditContext,
        description: Option<&str>,
    ) -> Result<User, AppError> {
        let now = chrono::Utc::now();
        let query = format!(
            "UPDATE {} SET is_deleted = TRUE, deleted_at = $2, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, User>(&query)
            .bind(item.id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
        audit_soft_deleted(conn, item, &row, ctx, description).await?;
        Ok(row)
    }
}

impl Repository<User> for UserRepository {
    const TABLE: &'static str = TABLE_NAME;
    const ENTITY: &'static str = "User";
    type Id = UserId;

    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: UserId,
    ) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = $1 AND is_deleted = FALSE",
            SELECT_COLUMNS, TABLE_NAME
        );
        let row = sqlx::query_as::<_, User>(&query)
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
    ) -> Result<Vec<User>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE is_deleted = FALSE ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, User>(&query)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}
