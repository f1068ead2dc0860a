//! Audit repository (append-only).
//!
//! All audit events are inserted through this repository; rows are never
//! updated or deleted. Event timestamps are server-assigned.

use serde_json::Value;
use sqlx::{types::Json, PgConnection};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::audit_log::{AuditAction, AuditLog};
use crate::repositories::audit_context::AuditContext;
use crate::repositories::repository::effective_limit;
use crate::repositories::snapshot::{snapshot_diff, AuditEntity};
use crate::types::AuditLogId;

const TABLE_NAME: &str = "audit_logs";
const SELECT_COLUMNS: &str = "id, occurred_at, actor_id, actor_type, actor_ip, actor_user_agent, \
action, entity_type, entity_id, organization_id, old_values, new_values, changes, description, \
metadata, request_id, session_id";

/// One audit event to append, independent of the acting context.
#[derive(Debug)]
pub struct AuditEvent<'a> {
    pub action: AuditAction,
    pub entity_type: &'a str,
    pub entity_id: Uuid,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub changes: Option<Value>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuditRepository;

impl AuditRepository {
    pub fn new() -> Self {
        Self
    }

    /// Appends one event; `occurred_at` is assigned by the database.
    ///
    /// `clock_timestamp()` rather than `now()`: events appended within one
    /// transaction must still order by actual occurrence.
    pub async fn append(
        &self,
        conn: &mut PgConnection,
        event: AuditEvent<'_>,
        ctx: &AuditContext,
    ) -> Result<AuditLog, AppError> {
        let query = format!(
            "INSERT INTO {} (id, occurred_at, actor_id, actor_type, actor_ip, actor_user_agent, \
             action, entity_type, entity_id, organization_id, old_values, new_values, changes, \
             description, metadata, request_id, session_id) \
             VALUES ($1, clock_timestamp(), $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
             $14, $15, $16) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, AuditLog>(&query)
            .bind(AuditLogId::new())
            .bind(ctx.actor_id)
            .bind(ctx.actor_type.db_value())
            .bind(&ctx.actor_ip)
            .bind(&ctx.actor_user_agent)
            .bind(event.action.db_value())
            .bind(event.entity_type)
            .bind(event.entity_id)
            .bind(ctx.organization_id)
            .bind(event.old_values.map(Json))
            .bind(event.new_values.map(Json))
            .bind(event.changes.map(Json))
            .bind(event.description)
            .bind(ctx.extra.clone().map(Json))
            .bind(&ctx.request_id)
            .bind(&ctx.session_id)
            .fetch_one(conn)
            .await?;
        Ok(row)
    }

    /// Events for one entity, newest first.
    pub async fn list_for_entity(
        &self,
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY occurred_at DESC, id DESC LIMIT $3 OFFSET $4",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, AuditLog>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(effective_limit(limit))
            .bind(offset)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Total number of events recorded for one entity.
    pub async fn count_for_entity(
        &self,
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<i64, AppError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE entity_type = $1 AND entity_id = $2",
            TABLE_NAME
        );
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }
}

/// Emits the CREATE event for a freshly inserted entity.
pub async fn audit_created<T: AuditEntity>(
    conn: &mut PgConnection,
    entity: &T,
    ctx: &AuditContext,
    description: Option<&str>,
) -> Result<(), AppError> {
    AuditRepository
        .append(
            conn,
            AuditEvent {
                action: AuditAction::Create,
                entity_type: T::ENTITY_TYPE,
                entity_id: entity.audit_entity_id(),
                old_values: None,
                new_values: Some(Value::Object(entity.snapshot())),
                changes: None,
                description,
            },
            ctx,
        )
        .await
        .map(|_| ())
}

/// Emits the UPDATE event with the key-wise diff between both snapshots.
pub async fn audit_updated<T: AuditEntity>(
    conn: &mut PgConnection,
    before: &T,
    after: &T,
    ctx: &AuditContext,
    description: Option<&str>,
) -> Result<(), AppError> {
    let old = before.snapshot();
    let new = after.snapshot();
    let changes = snapshot_diff(&old, &new);
    AuditRepository
        .append(
            conn,
            AuditEvent {
                action: AuditAction::Update,
                entity_type: T::ENTITY_TYPE,
                entity_id: after.audit_entity_id(),
                old_values: Some(Value::Object(old)),
                new_values: Some(Value::Object(new)),
                changes,
                description,
            },
            ctx,
        )
        .await
        .map(|_| ())
}

/// Emits the DELETE event for a soft-deleted entity.
pub async fn audit_soft_deleted<T: AuditEntity>(
    conn: &mut PgConnection,
    before: &T,
    after: &T,
    ctx: &AuditContext,
    description: Option<&str>,
) -> Result<(), AppError> {
    let old = before.snapshot();
    let new = after.snapshot();
    let changes = snapshot_diff(&old, &new);
    AuditRepository
        .append(
            conn,
            AuditEvent {
                action: AuditAction::Delete,
                entity_type: T::ENTITY_TYPE,
                entity_id: after.audit_entity_id(),
                old_values: Some(Value::Object(old)),
                new_values: Some(Value::Object(new)),
                changes,
                description,
            },
            ctx,
        )
        .await
        .map(|_| ())
}
