//! Models describing leave requests and their lifecycle.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::repositories::snapshot::{
    date_value, id_value, opt_id_value, opt_string_value, opt_timestamp_value, timestamp_value,
    AuditEntity, Snapshot,
};
use crate::types::{
    LeavePolicyId, LeaveRequestCommentId, LeaveRequestDateId, LeaveRequestId, LeaveTypeId, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of a leave request.
pub struct LeaveRequest {
    /// Unique identifier for the leave request.
    pub id: LeaveRequestId,
    /// Human-readable reference, e.g. `LR-3F2A9C81D04B`; unique.
    pub request_number: String,
    /// Employee the request belongs to.
    pub user_id: UserId,
    pub leave_type_id: LeaveTypeId,
    /// Policy resolved at creation time.
    pub policy_id: Option<LeavePolicyId>,
    /// First day of the requested leave period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the requested leave period (inclusive).
    pub end_date: NaiveDate,
    pub total_days: f64,
    pub reason: Option<String>,
    /// Current lifecycle status.
    pub status: LeaveRequestStatus,
    /// Step order of the workflow step awaiting action.
    pub current_workflow_step: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Set exactly when the request is APPROVED or REJECTED.
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<UserId>,
    pub decision_remarks: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<UserId>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Leave request lifecycle states; terminal states are sinks.
pub enum LeaveRequestStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
    Withdrawn,
}

impl LeaveRequestStatus {
    pub fn db_value(&self) -> &'static str {
        match self {
            LeaveRequestStatus::Draft => "draft",
            LeaveRequestStatus::PendingApproval => "pending_approval",
            LeaveRequestStatus::Approved => "approved",
            LeaveRequestStatus::Rejected => "rejected",
            LeaveRequestStatus::Cancelled => "cancelled",
            LeaveRequestStatus::Withdrawn => "withdrawn",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveRequestStatus::Approved
                | LeaveRequestStatus::Rejected
                | LeaveRequestStatus::Cancelled
                | LeaveRequestStatus::Withdrawn
        )
    }

    /// States whose date window still occupies the calendar for overlap
    /// checks. Rejected/cancelled/withdrawn requests release their window.
    pub fn occupies_dates(&self) -> bool {
        matches!(
            self,
            LeaveRequestStatus::Draft
                | LeaveRequestStatus::PendingApproval
                | LeaveRequestStatus::Approved
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_leave_window"))]
/// Payload used to create a new leave request.
pub struct CreateLeaveRequest {
    pub leave_type_id: LeaveTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: f64,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

fn validate_leave_window(req: &CreateLeaveRequest) -> Result<(), validator::ValidationError> {
    if req.start_date > req.end_date {
        return Err(validator::ValidationError::new("start_date_after_end_date"));
    }
    if req.total_days <= 0.0 {
        return Err(validator::ValidationError::new("total_days_not_positive"));
    }
    Ok(())
}

impl LeaveRequest {
    /// Creates a new request in DRAFT with a freshly generated request number.
    pub fn new(
        user_id: UserId,
        leave_type_id: LeaveTypeId,
        policy_id: LeavePolicyId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_days: f64,
        reason: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LeaveRequestId::new(),
            request_number: generate_request_number("LR"),
            user_id,
            leave_type_id,
            policy_id: Some(policy_id),
            start_date,
            end_date,
            total_days,
            reason,
            status: LeaveRequestStatus::Draft,
            current_workflow_step: 0,
            submitted_at: None,
            decided_at: None,
            decided_by: None,
            decision_remarks: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Transitions DRAFT -> PENDING_APPROVAL and resets the workflow cursor.
    pub fn mark_submitted(&mut self, now: DateTime<Utc>) {
        self.status = LeaveRequestStatus::PendingApproval;
        self.submitted_at = Some(now);
        self.current_workflow_step = 0;
        self.updated_at = now;
    }

    /// Records the final approval decision.
    pub fn mark_approved(&mut self, by: UserId, remarks: Option<String>, now: DateTime<Utc>) {
        self.status = LeaveRequestStatus::Approved;
        self.decided_at = Some(now);
        self.decided_by = Some(by);
        self.decision_remarks = remarks;
        self.updated_at = now;
    }

    /// Records the rejection decision.
    pub fn mark_rejected(&mut self, by: UserId, remarks: Option<String>, now: DateTime<Utc>) {
        self.status = LeaveRequestStatus::Rejected;
        self.decided_at = Some(now);
        self.decided_by = Some(by);
        self.decision_remarks = remarks;
        self.updated_at = now;
    }

    /// Records withdrawal by the request owner.
    pub fn mark_withdrawn(&mut self, by: UserId, reason: Option<String>, now: DateTime<Utc>) {
        self.status = LeaveRequestStatus::Withdrawn;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(by);
        self.cancellation_reason = reason;
        self.updated_at = now;
    }

    /// Moves the workflow cursor to the given step order.
    pub fn advance_cursor(&mut self, step_order: i32, now: DateTime<Utc>) {
        self.current_workflow_step = step_order;
        self.updated_at = now;
    }

    pub fn is_pending_approval(&self) -> bool {
        matches!(self.status, LeaveRequestStatus::PendingApproval)
    }
}

/// Generates a request number: prefix + 12 uppercase hex characters from a
/// cryptographic source. Uniqueness is ultimately enforced by the unique
/// index on `request_number`.
pub fn generate_request_number(prefix: &str) -> String {
    let mut bytes = [0u8; 6];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{}-{}", prefix, hex::encode(bytes).to_uppercase())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// One row per day inside a request's window.
pub struct LeaveRequestDate {
    pub id: LeaveRequestDateId,
    pub leave_request_id: LeaveRequestId,
    pub leave_date: NaiveDate,
    /// 1.0 for a full day, 0.5 for a half day.
    pub day_value: f64,
    pub is_holiday: bool,
    pub is_weekend: bool,
    pub holiday_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LeaveRequestDate {
    pub fn new(leave_request_id: LeaveRequestId, leave_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: LeaveRequestDateId::new(),
            leave_request_id,
            leave_date,
            day_value: 1.0,
            is_holiday: false,
            is_weekend: matches!(leave_date.weekday(), Weekday::Sat | Weekday::Sun),
            holiday_name: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Comment attached to a leave request; does not change request state.
pub struct LeaveRequestComment {
    pub id: LeaveRequestCommentId,
    pub leave_request_id: LeaveRequestId,
    pub user_id: UserId,
    pub comment: String,
    /// Visible to HR/managers only when set.
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LeaveRequestComment {
    pub fn new(
        leave_request_id: LeaveRequestId,
        user_id: UserId,
        comment: String,
        is_internal: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LeaveRequestCommentId::new(),
            leave_request_id,
            user_id,
            comment,
            is_internal,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }
}

impl AuditEntity for LeaveRequest {
    const ENTITY_TYPE: &'static str = "LeaveRequest";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("request_number".into(), self.request_number.clone().into());
        snap.insert("user_id".into(), id_value(self.user_id));
        snap.insert("leave_type_id".into(), id_value(self.leave_type_id));
        snap.insert("policy_id".into(), opt_id_value(self.policy_id));
        snap.insert("start_date".into(), date_value(&self.start_date));
        snap.insert("end_date".into(), date_value(&self.end_date));
        snap.insert("total_days".into(), serde_json::json!(self.total_days));
        snap.insert("reason".into(), opt_string_value(&self.reason));
        snap.insert("status".into(), self.status.db_value().into());
        snap.insert(
            "current_workflow_step".into(),
            serde_json::json!(self.current_workflow_step),
        );
        snap.insert(
            "submitted_at".into(),
            opt_timestamp_value(&self.submitted_at),
        );
        snap.insert("decided_at".into(), opt_timestamp_value(&self.decided_at));
        snap.insert("decided_by".into(), opt_id_value(self.decided_by));
        snap.insert(
            "decision_remarks".into(),
            opt_string_value(&self.decision_remarks),
        );
        snap.insert(
            "cancelled_at".into(),
            opt_timestamp_value(&self.cancelled_at),
        );
        snap.insert("cancelled_by".into(), opt_id_value(self.cancelled_by));
        snap.insert(
            "cancellation_reason".into(),
            opt_string_value(&self.cancellation_reason),
        );
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}

impl AuditEntity for LeaveRequestDate {
    const ENTITY_TYPE: &'static str = "LeaveRequestDate";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("leave_request_id".into(), id_value(self.leave_request_id));
        snap.insert("leave_date".into(), date_value(&self.leave_date));
        snap.insert("day_value".into(), serde_json::json!(self.day_value));
        snap.insert("is_holiday".into(), self.is_holiday.into());
        snap.insert("is_weekend".into(), self.is_weekend.into());
        snap.insert("holiday_name".into(), opt_string_value(&self.holiday_name));
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}

impl AuditEntity for LeaveRequestComment {
    const ENTITY_TYPE: &'static str = "LeaveRequestComment";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("leave_request_id".into(), id_value(self.leave_request_id));
        snap.insert("user_id".into(), id_value(self.user_id));
        snap.insert("comment".into(), self.comment.clone().into());
        snap.insert("is_internal".into(), self.is_internal.into());
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}
