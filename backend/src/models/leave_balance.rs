//! Per-period leave balance accounting records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repositories::snapshot::{
    id_value, opt_timestamp_value, timestamp_value, AuditEntity, Snapshot,
};
use crate::types::{LeaveBalanceId, LeavePolicyId, LeaveTypeId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// One row per (user, leave type, period). `available` is derived, never
/// stored: opening + accrued + carried_forward + adjusted − used − pending
/// − encashed − expired.
pub struct LeaveBalance {
    pub id: LeaveBalanceId,
    pub user_id: UserId,
    pub leave_type_id: LeaveTypeId,
    pub policy_id: LeavePolicyId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub opening_balance: f64,
    pub accrued: f64,
    /// Consumed days; monotonic non-decreasing.
    pub used: f64,
    /// Reserved days awaiting a decision; counted against `available`.
    pub pending: f64,
    pub adjusted: f64,
    pub carried_forward: f64,
    pub encashed: f64,
    pub expired: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LeaveBalance {
    /// Derived available balance.
    pub fn available(&self) -> f64 {
        self.opening_balance + self.accrued + self.carried_forward + self.adjusted
            - self.used
            - self.pending
            - self.encashed
            - self.expired
    }
}

impl AuditEntity for LeaveBalance {
    const ENTITY_TYPE: &'static str = "LeaveBalance";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("user_id".into(), id_value(self.user_id));
        snap.insert("leave_type_id".into(), id_value(self.leave_type_id));
        snap.insert("policy_id".into(), id_value(self.policy_id));
        snap.insert("period_start".into(), timestamp_value(&self.period_start));
        snap.insert("period_end".into(), timestamp_value(&self.period_end));
        snap.insert(
            "opening_balance".into(),
            serde_json::json!(self.opening_balance),
        );
        snap.insert("accrued".into(), serde_json::json!(self.accrued));
        snap.insert("used".into(), serde_json::json!(self.used));
        snap.insert("pending".into(), serde_json::json!(self.pending));
        snap.insert("adjusted".into(), serde_json::json!(self.adjusted));
        snap.insert(
            "carried_forward".into(),
            serde_json::json!(self.carried_forward),
        );
        snap.insert("encashed".into(), serde_json::json!(self.encashed));
        snap.insert("expired".into(), serde_json::json!(self.expired));
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
    use chrono::Duration;

    pub(crate) fn sample_balance(opening: f64) -> LeaveBalance {
        let now = Utc::now();
        LeaveBalance {
            id: LeaveBalanceId::new(),
            user_id: UserId::new(),
            leave_type_id: LeaveTypeId::new(),
            policy_id: LeavePolicyId::new(),
            period_start: now - Duration::days(30),
            period_end: now + Duration::days(335),
            opening_balance: opening,
            accrued: 0.0,
            used: 0.0,
            pending: 0.0,
            adjusted: 0.0,
            carried_forward: 0.0,
            encashed: 0.0,
            expired: 0.0,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn available_sums_all_signed_components() {
        let mut balance = sample_balance(20.0);
        balance.accrued = 2.0;
        balance.carried_forward = 3.0;
        balance.adjusted = 1.0;
        balance.used = 4.0;
        balance.pending = 2.0;
        balance.encashed = 1.0;
        balance.expired = 0.5;
        assert_eq!(balance.available(), 18.5);
    }

    #[test]
    fn reserving_days_lowers_available_without_touching_used() {
        let mut balance = sample_balance(20.0);
        balance.pending += 3.0;
        assert_eq!(balance.available(), 17.0);
        assert_eq!(balance.used, 0.0);
    }

    #[test]
    fn consuming_reserved_days_keeps_available_constant() {
        let mut balance = sample_balance(20.0);
        balance.pending += 3.0;
        let before = balance.available();

        balance.pending -= 3.0;
        balance.used += 3.0;

        assert_eq!(balance.available(), before);
        assert_eq!(balance.used, 3.0);
    }
}
