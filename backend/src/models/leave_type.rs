//! Leave categories configurable per organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::repositories::snapshot::{
    id_value, opt_f64_value, opt_string_value, opt_timestamp_value, timestamp_value, AuditEntity,
    Snapshot,
};
use crate::types::{LeaveTypeId, OrganizationId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Organization-scoped leave category; `code` is unique per organization.
pub struct LeaveType {
    pub id: LeaveTypeId,
    pub organization_id: OrganizationId,
    /// Short stable code such as `ANNUAL` or `SICK`.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_paid: bool,
    pub is_active: bool,
    /// Whether requests of this type must carry a reason.
    pub requires_reason: bool,
    pub min_days_per_request: f64,
    pub max_days_per_request: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
/// Payload used to create a new leave type.
pub struct CreateLeaveType {
    pub organization_id: OrganizationId,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_paid: bool,
    #[serde(default = "default_true")]
    pub requires_reason: bool,
    #[serde(default = "default_min_days")]
    pub min_days_per_request: f64,
    pub max_days_per_request: Option<f64>,
}

fn default_true() -> bool {
    true
}

fn default_min_days() -> f64 {
    0.5
}

impl LeaveType {
    pub fn new(data: CreateLeaveType) -> Self {
        let now = Utc::now();
        Self {
            id: LeaveTypeId::new(),
            organization_id: data.organization_id,
            code: data.code,
            name: data.name,
            description: data.description,
            is_paid: data.is_paid,
            is_active: true,
            requires_reason: data.requires_reason,
            min_days_per_request: data.min_days_per_request,
            max_days_per_request: data.max_days_per_request,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

impl AuditEntity for LeaveType {
    const ENTITY_TYPE: &'static str = "LeaveType";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("organization_id".into(), id_value(self.organization_id));
        snap.insert("code".into(), self.code.clone().into());
        snap.insert("name".into(), self.name.clone().into());
        snap.insert("description".into(), opt_string_value(&self.description));
        snap.insert("is_paid".into(), self.is_paid.into());
        snap.insert("is_active".into(), self.is_active.into());
        snap.insert("requires_reason".into(), self.requires_reason.into());
        snap.insert(
            "min_days_per_request".into(),
            serde_json::json!(self.min_days_per_request),
        );
        snap.insert(
            "max_days_per_request".into(),
            opt_f64_value(self.max_days_per_request),
        );
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_leave_types_are_active_and_not_deleted() {
        let lt = LeaveType::new(CreateLeaveType {
            organization_id: OrganizationId::new(),
            code: "ANNUAL".into(),
            name: "Annual Leave".into(),
            description: None,
            is_paid: true,
            requires_reason: true,
            min_days_per_request: 0.5,
            max_days_per_request: Some(20.0),
        });
        assert!(lt.is_active);
        assert!(!lt.is_deleted);
        assert_eq!(lt.snapshot().get("code"), Some(&serde_json::json!("ANNUAL")));
    }
}
