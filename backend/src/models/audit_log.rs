//! Append-only audit trail rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::types::{AuditLogId, OrganizationId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Immutable audit event; rows are only ever inserted.
pub struct AuditLog {
    pub id: AuditLogId,
    /// Server-assigned event time.
    pub occurred_at: DateTime<Utc>,
    /// Acting user; `None` for system/scheduler actions.
    pub actor_id: Option<UserId>,
    pub actor_type: ActorType,
    pub actor_ip: Option<String>,
    pub actor_user_agent: Option<String>,
    pub action: AuditAction,
    /// Entity type name, e.g. `LeaveRequest`.
    pub entity_type: String,
    pub entity_id: Uuid,
    pub organization_id: Option<OrganizationId>,
    /// Snapshot before the mutation; `None` on create.
    pub old_values: Option<Json<Value>>,
    /// Snapshot after the mutation; `None` on hard delete.
    pub new_values: Option<Json<Value>>,
    /// Key-wise diff `{key: {old, new}}`; `None` when nothing changed.
    pub changes: Option<Json<Value>>,
    pub description: Option<String>,
    pub metadata: Option<Json<Value>>,
    /// Correlation ID of the inbound request.
    pub request_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Types of auditable actions emitted by the repositories.
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn db_value(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Kind of actor recorded on an audit event.
pub enum ActorType {
    User,
    System,
    Scheduler,
}

impl ActorType {
    pub fn db_value(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::System => "system",
            ActorType::Scheduler => "scheduler",
        }
    }
}
