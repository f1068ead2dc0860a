//! Approval workflow definitions and their per-request step instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::repositories::snapshot::{
    id_value, opt_string_value, opt_timestamp_value, timestamp_value, AuditEntity, Snapshot,
};
use crate::types::{LeaveRequestId, OrganizationId, UserId, WorkflowConfigurationId, WorkflowStepId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Org-scoped workflow definition; resolution picks the active one with the
/// highest priority whose effective window covers the instant.
pub struct WorkflowConfiguration {
    pub id: WorkflowConfigurationId,
    pub organization_id: OrganizationId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Opaque matching-criteria blob; evaluation is a boundary concern.
    pub criteria: Json<Value>,
    /// Higher priority wins during resolution.
    pub priority: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl WorkflowConfiguration {
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if self.effective_from > at {
            return false;
        }
        match self.effective_to {
            Some(to) => to >= at,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Concrete approval step bound to one leave request.
pub struct WorkflowStep {
    pub id: WorkflowStepId,
    pub leave_request_id: LeaveRequestId,
    /// Zero-based, contiguous position within the request's workflow.
    pub step_order: i32,
    pub step_name: String,
    /// User expected to action this step.
    pub approver_id: UserId,
    pub status: WorkflowStepStatus,
    pub actioned_at: Option<DateTime<Utc>>,
    pub action_remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Individual workflow step states.
///
/// QUEUED marks instantiated steps that are not yet at the cursor; at any
/// instant at most one step of a request is PENDING.
pub enum WorkflowStepStatus {
    Queued,
    Pending,
    Approved,
    Rejected,
    Skipped,
    Escalated,
    Delegated,
}

impl WorkflowStepStatus {
    pub fn db_value(&self) -> &'static str {
        match self {
            WorkflowStepStatus::Queued => "queued",
            WorkflowStepStatus::Pending => "pending",
            WorkflowStepStatus::Approved => "approved",
            WorkflowStepStatus::Rejected => "rejected",
            WorkflowStepStatus::Skipped => "skipped",
            WorkflowStepStatus::Escalated => "escalated",
            WorkflowStepStatus::Delegated => "delegated",
        }
    }

    /// Whether the step still awaits an outcome (queued or at the cursor).
    pub fn is_open(&self) -> bool {
        matches!(self, WorkflowStepStatus::Queued | WorkflowStepStatus::Pending)
    }
}

impl WorkflowStep {
    /// Creates a step instance; only the step at order 0 starts PENDING.
    pub fn new(
        leave_request_id: LeaveRequestId,
        step_order: i32,
        approver_id: UserId,
    ) -> Self {
        let now = Utc::now();
        let status = if step_order == 0 {
            WorkflowStepStatus::Pending
        } else {
            WorkflowStepStatus::Queued
        };
        Self {
            id: WorkflowStepId::new(),
            leave_request_id,
            step_order,
            step_name: format!("Step {}", step_order + 1),
            approver_id,
            status,
            actioned_at: None,
            action_remarks: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Marks the step approved with the reviewer's remarks.
    pub fn mark_approved(&mut self, remarks: Option<String>, now: DateTime<Utc>) {
        self.status = WorkflowStepStatus::Approved;
        self.actioned_at = Some(now);
        self.action_remarks = remarks;
        self.updated_at = now;
    }

    /// Marks the step rejected with the reviewer's remarks.
    pub fn mark_rejected(&mut self, remarks: Option<String>, now: DateTime<Utc>) {
        self.status = WorkflowStepStatus::Rejected;
        self.actioned_at = Some(now);
        self.action_remarks = remarks;
        self.updated_at = now;
    }

    /// Moves a queued step to the cursor.
    pub fn mark_pending(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStepStatus::Pending;
        self.updated_at = now;
    }

    /// Skips an open step when the workflow terminates early.
    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStepStatus::Skipped;
        self.updated_at = now;
    }
}

impl AuditEntity for WorkflowConfiguration {
    const ENTITY_TYPE: &'static str = "WorkflowConfiguration";

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
        snap.insert("criteria".into(), self.criteria.0.clone());
        snap.insert("priority".into(), serde_json::json!(self.priority));
        snap.insert(
            "effective_from".into(),
            timestamp_value(&self.effective_from),
        );
        snap.insert(
            "effective_to".into(),
            opt_timestamp_value(&self.effective_to),
        );
        snap.insert("is_active".into(), self.is_active.into());
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}

impl AuditEntity for WorkflowStep {
    const ENTITY_TYPE: &'static str = "WorkflowStep";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("leave_request_id".into(), id_value(self.leave_request_id));
        snap.insert("step_order".into(), serde_json::json!(self.step_order));
        snap.insert("step_name".into(), self.step_name.clone().into());
        snap.insert("approver_id".into(), id_value(self.approver_id));
        snap.insert("status".into(), self.status.db_value().into());
        snap.insert("actioned_at".into(), opt_timestamp_value(&self.actioned_at));
        snap.insert(
            "action_remarks".into(),
            opt_string_value(&self.action_remarks),
        );
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}
