//! Audit context threaded through every mutating operation.
//!
//! Repositories are responsible for emitting audit events for all mutations;
//! the context carries the actor's identity and request provenance.

use serde_json::Value;

use crate::models::audit_log::ActorType;
use crate::types::{OrganizationId, UserId};

#[derive(Debug, Clone)]
pub struct AuditContext {
    pub actor_id: Option<UserId>,
    pub actor_type: ActorType,
    pub actor_ip: Option<String>,
    pub actor_user_agent: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub extra: Option<Value>,
}

impl Default for AuditContext {
    fn default() -> Self {
        Self {
            actor_id: None,
            actor_type: ActorType::System,
            actor_ip: None,
            actor_user_agent: None,
            organization_id: None,
            request_id: None,
            session_id: None,
            extra: None,
        }
    }
}

impl AuditContext {
    /// Context for actions performed by the system itself.
    pub fn system() -> Self {
        Self::default()
    }

    /// Context for actions performed by an authenticated user.
    pub fn for_user(actor_id: UserId, organization_id: OrganizationId) -> Self {
        Self {
            actor_id: Some(actor_id),
            actor_type: ActorType::User,
            organization_id: Some(organization_id),
            ..Self::default()
        }
    }
}
