//! Leave policies: accrual, eligibility, and carry-forward rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::repositories::snapshot::{
    id_value, opt_f64_value, opt_string_value, opt_timestamp_value, timestamp_value, AuditEntity,
    Snapshot,
};
use crate::types::{LeavePolicyId, LeaveTypeId, OrganizationId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Configurable rule set scoped to (organization, leave type) with an
/// effective window; resolution picks the most recently effective one.
pub struct LeavePolicy {
    pub id: LeavePolicyId,
    pub organization_id: OrganizationId,
    pub leave_type_id: LeaveTypeId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub effective_from: DateTime<Utc>,
    /// `None` means no end date.
    pub effective_to: Option<DateTime<Utc>>,
    pub accrual_frequency: AccrualFrequency,
    /// Amount credited per accrual period; never negative.
    pub accrual_amount: f64,
    pub accrual_cap: Option<f64>,
    pub carry_forward_type: CarryForwardType,
    pub carry_forward_limit: Option<f64>,
    pub eligibility_type: EligibilityType,
    /// Days of tenure required when `eligibility_type` is AFTER_TENURE.
    pub eligibility_tenure_days: Option<i32>,
    /// Opaque rule blob consumed by the CUSTOM eligibility interpreter.
    pub eligibility_rules: Json<Value>,
    pub allow_negative_balance: bool,
    pub negative_balance_limit: Option<f64>,
    pub include_weekends: bool,
    pub include_holidays: bool,
    pub encashment_allowed: bool,
    pub encashment_max_days: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Leave accrual frequency types.
pub enum AccrualFrequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
    OneTime,
}

impl AccrualFrequency {
    pub fn db_value(&self) -> &'static str {
        match self {
            AccrualFrequency::Daily => "daily",
            AccrualFrequency::Weekly => "weekly",
            AccrualFrequency::BiWeekly => "bi_weekly",
            AccrualFrequency::Monthly => "monthly",
            AccrualFrequency::Quarterly => "quarterly",
            AccrualFrequency::SemiAnnually => "semi_annually",
            AccrualFrequency::Annually => "annually",
            AccrualFrequency::OneTime => "one_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Types of carry-forward rules.
pub enum CarryForwardType {
    None,
    Unlimited,
    Capped,
    Percentage,
}

impl CarryForwardType {
    pub fn db_value(&self) -> &'static str {
        match self {
            CarryForwardType::None => "none",
            CarryForwardType::Unlimited => "unlimited",
            CarryForwardType::Capped => "capped",
            CarryForwardType::Percentage => "percentage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// Types of eligibility rules.
pub enum EligibilityType {
    Immediate,
    AfterProbation,
    AfterTenure,
    Custom,
}

impl EligibilityType {
    pub fn db_value(&self) -> &'static str {
        match self {
            EligibilityType::Immediate => "immediate",
            EligibilityType::AfterProbation => "after_probation",
            EligibilityType::AfterTenure => "after_tenure",
            EligibilityType::Custom => "custom",
        }
    }
}

impl LeavePolicy {
    /// Whether the effective window covers the given instant.
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if self.effective_from > at {
            return false;
        }
        match self.effective_to {
            Some(to) => to >= at,
            None => true,
        }
    }

    /// Lowest balance the policy permits after a reservation.
    ///
    /// Zero unless negative balances are allowed, in which case the
    /// configured limit applies (unbounded when unset).
    pub fn balance_floor(&self) -> f64 {
        if self.allow_negative_balance {
            match self.negative_balance_limit {
                Some(limit) => -limit.abs(),
                None => f64::NEG_INFINITY,
            }
        } else {
            0.0
        }
    }
}

impl AuditEntity for LeavePolicy {
    const ENTITY_TYPE: &'static str = "LeavePolicy";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("organization_id".into(), id_value(self.organization_id));
        snap.insert("leave_type_id".into(), id_value(self.leave_type_id));
        snap.insert("code".into(), self.code.clone().into());
        snap.insert("name".into(), self.name.clone().into());
        snap.insert("description".into(), opt_string_value(&self.description));
        snap.insert(
            "effective_from".into(),
            timestamp_value(&self.effective_from),
        );
        snap.insert(
            "effective_to".into(),
            opt_timestamp_value(&self.effective_to),
        );
        snap.insert(
            "accrual_frequency".into(),
            self.accrual_frequency.db_value().into(),
        );
        snap.insert(
            "accrual_amount".into(),
            serde_json::json!(self.accrual_amount),
        );
        snap.insert("accrual_cap".into(), opt_f64_value(self.accrual_cap));
        snap.insert(
            "carry_forward_type".into(),
            self.carry_forward_type.db_value().into(),
        );
        snap.insert(
            "carry_forward_limit".into(),
            opt_f64_value(self.carry_forward_limit),
        );
        snap.insert(
            "eligibility_type".into(),
            self.eligibility_type.db_value().into(),
        );
        snap.insert(
            "eligibility_tenure_days".into(),
            self.eligibility_tenure_days
                .map(|d| serde_json::json!(d))
                .unwrap_or(Value::Null),
        );
        snap.insert("eligibility_rules".into(), self.eligibility_rules.0.clone());
        snap.insert(
            "allow_negative_balance".into(),
            self.allow_negative_balance.into(),
        );
        snap.insert(
            "negative_balance_limit".into(),
            opt_f64_value(self.negative_balance_limit),
        );
        snap.insert("include_weekends".into(), self.include_weekends.into());
        snap.insert("include_holidays".into(), self.include_holidays.into());
        snap.insert("encashment_allowed".into(), self.encashment_allowed.into());
        snap.insert(
            "encashment_max_days".into(),
            opt_f64_value(self.encashment_max_days),
        );
        snap.insert("is_active".into(), self.is_active.into());
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

    pub(crate) fn sample_policy() -> LeavePolicy {
        let now = Utc::now();
        LeavePolicy {
            id: LeavePolicyId::new(),
            organization_id: OrganizationId::new(),
            leave_type_id: LeaveTypeId::new(),
            code: "ANNUAL-DEFAULT".into(),
            name: "Default annual policy".into(),
            description: None,
            effective_from: now - Duration::days(30),
            effective_to: None,
            accrual_frequency: AccrualFrequency::Monthly,
            accrual_amount: 1.5,
            accrual_cap: None,
            carry_forward_type: CarryForwardType::None,
            carry_forward_limit: None,
            eligibility_type: EligibilityType::Immediate,
            eligibility_tenure_days: None,
            eligibility_rules: Json(Value::Object(Default::default())),
            allow_negative_balance: false,
            negative_balance_limit: None,
            include_weekends: false,
            include_holidays: false,
            encashment_allowed: false,
            encashment_max_days: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn effective_window_covers_open_ended_policies() {
        let policy = sample_policy();
        assert!(policy.is_effective_at(Utc::now()));
        assert!(!policy.is_effective_at(Utc::now() - Duration::days(60)));
    }

    #[test]
    fn effective_window_respects_end_date() {
        let mut policy = sample_policy();
        policy.effective_to = Some(Utc::now() - Duration::days(1));
        assert!(!policy.is_effective_at(Utc::now()));
    }

    #[test]
    fn balance_floor_defaults_to_zero() {
        let mut policy = sample_policy();
        assert_eq!(policy.balance_floor(), 0.0);

        policy.allow_negative_balance = true;
        policy.negative_balance_limit = Some(5.0);
        assert_eq!(policy.balance_floor(), -5.0);

        policy.negative_balance_limit = None;
        assert_eq!(policy.balance_floor(), f64::NEG_INFINITY);
    }

    #[test]
    fn eligibility_type_serde_snake_case() {
        let value: EligibilityType = serde_json::from_str("\"after_probation\"").unwrap();
        assert_eq!(value, EligibilityType::AfterProbation);
        assert_eq!(
            serde_json::to_value(EligibilityType::AfterTenure).unwrap(),
            serde_json::json!("after_tenure")
        );
    }
}
