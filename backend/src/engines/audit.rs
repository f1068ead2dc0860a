//! Audit engine.
//!
//! The append-only audit trail is the source of truth for state changes.
//! Repositories emit the events; this engine provides read APIs and a
//! helper for building the acting context at the boundary.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::audit_log::{ActorType, AuditLog};
use crate::repositories::{AuditContext, AuditRepository};
use crate::types::{OrganizationId, UserId};

#[derive(Debug, Default, Clone, Copy)]
pub struct AuditEngine {
    audit_repo: AuditRepository,
}

impl AuditEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded for one entity, newest first.
    pub async fn list_entity_events(
        &self,
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        self.audit_repo
            .list_for_entity(conn, entity_type, entity_id, limit, offset)
            .await
    }

    /// Builds the audit context threaded through mutating operations.
    pub fn make_context(
        &self,
        actor_id: Option<UserId>,
        actor_type: ActorType,
        organization_id: Option<OrganizationId>,
    ) -> AuditContext {
        AuditContext {
            actor_id,
            actor_type,
            organization_id,
            ..AuditContext::default()
        }
    }
}
