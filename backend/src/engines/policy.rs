//! Policy engine (config-driven).
//!
//! No hardcoded business rules: policies, eligibility rules, accrual, and
//! carry-forward configuration live in the database; this engine reads and
//! evaluates them.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_balance::LeaveBalance;
use crate::models::leave_policy::{EligibilityType, LeavePolicy};
use crate::models::user::User;
use crate::repositories::{LeaveBalanceRepository, LeavePolicyRepository};
use crate::types::{LeaveTypeId, UserId};

/// Outcome of policy resolution: the chosen policy plus a human-readable
/// explanation of why it won.
#[derive(Debug, Clone)]
pub struct PolicyResolution {
    pub policy: LeavePolicy,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyEngine {
    policy_repo: LeavePolicyRepository,
    balance_repo: LeaveBalanceRepository,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the applicable policy for a user and leave type.
    ///
    /// Picks the active policy whose effective window covers the instant
    /// with the most recent `effective_from`; ties break deterministically
    /// on the policy id.
    pub async fn resolve_policy_for_user(
        &self,
        conn: &mut PgConnection,
        user: &User,
        leave_type_id: LeaveTypeId,
        at: Option<DateTime<Utc>>,
    ) -> Result<PolicyResolution, AppError> {
        let at = at.unwrap_or_else(Utc::now);
        let policies = self
            .policy_repo
            .list_active_for_leave_type(conn, user.organization_id, leave_type_id, at)
            .await?;

        match policies.into_iter().next() {
            Some(policy) => Ok(PolicyResolution {
                policy,
                reason: "Most recent active policy for leave type".into(),
            }),
            None => Err(AppError::PolicyNotFound {
                leave_type_id: leave_type_id.to_string(),
            }),
        }
    }

    /// Fails with `Eligibility` when the user may not consume leave under
    /// the resolved policy at the given instant.
    pub fn assert_eligible(
        &self,
        user: &User,
        policy: &LeavePolicy,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let at = at.unwrap_or_else(Utc::now);

        match policy.eligibility_type {
            EligibilityType::Immediate => Ok(()),
            EligibilityType::AfterProbation => match user.probation_end_date {
                None => Err(AppError::Eligibility {
                    message: "Probation end date not set".into(),
                    criteria: json!({}),
                }),
                Some(end) if at < end => Err(AppError::Eligibility {
                    message: "User is still on probation".into(),
                    criteria: json!({ "probation_end_date": end.to_rfc3339() }),
                }),
                Some(_) => Ok(()),
            },
            EligibilityType::AfterTenure => {
                let hire_date = user.hire_date.ok_or_else(|| AppError::Eligibility {
                    message: "Hire date not set".into(),
                    criteria: json!({}),
                })?;
                let tenure_days = (at - hire_date).num_days();
                let required = i64::from(policy.eligibility_tenure_days.unwrap_or(0));
                if tenure_days < required {
                    return Err(AppError::Eligibility {
                        message: "Minimum tenure not met".into(),
                        criteria: json!({
                            "tenure_days": tenure_days,
                            "required_days": required,
                        }),
                    });
                }
                Ok(())
            }
            EligibilityType::Custom => {
                let failures =
                    evaluate_custom_rules(&policy.eligibility_rules.0, &user.attributes.0);
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(AppError::Eligibility {
                        message: "Custom eligibility rules not met".into(),
                        criteria: json!({ "failures": failures }),
                    })
                }
            }
        }
    }

    /// Non-throwing lookup of the current-period balance.
    pub async fn get_balance(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        leave_type_id: LeaveTypeId,
        at: DateTime<Utc>,
    ) -> Result<Option<LeaveBalance>, AppError> {
        self.balance_repo
            .find_current(conn, user_id, leave_type_id, at)
            .await
    }
}

/// Deterministic interpreter for CUSTOM eligibility rules.
///
/// The rule blob is a conjunction over user attribute keys: a scalar value
/// means equality, an array means membership. A missing attribute fails its
/// test. Returns one failure detail per violated key; an empty result means
/// the user is eligible. Anything other than a JSON object passes (no rules
/// configured).
pub fn evaluate_custom_rules(rules: &Value, attributes: &Value) -> Vec<Value> {
    let Some(rules) = rules.as_object() else {
        return Vec::new();
    };

    let mut failures = Vec::new();
    for (key, expected) in rules {
        let actual = attributes.get(key).cloned().unwrap_or(Value::Null);
        let passed = match expected {
            Value::Array(allowed) => allowed.contains(&actual),
            other => actual == *other,
        };
        if !passed {
            failures.push(json!({
                "attribute": key,
                "expected": expected,
                "actual": actual,
            }));
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LeavePolicyId, OrganizationId};
    use chrono::Duration;
    use sqlx::types::Json;

    fn user_with(attributes: Value) -> User {
        use crate::models::user::CreateUser;
        let mut user = User::new(CreateUser {
            organization_id: OrganizationId::new(),
            employee_id: "E-1".into(),
            email: "e1@example.com".into(),
            first_name: "E".into(),
            last_name: "One".into(),
            manager_id: None,
            job_title: None,
            employment_type: None,
            hire_date: None,
            probation_end_date: None,
            attributes: Some(attributes),
        });
        user.hire_date = Some(Utc::now() - Duration::days(400));
        user
    }

    fn policy_with(eligibility: EligibilityType) -> LeavePolicy {
        use crate::models::leave_policy::{AccrualFrequency, CarryForwardType};
        use crate::types::LeaveTypeId;
        let now = Utc::now();
        LeavePolicy {
            id: LeavePolicyId::new(),
            organization_id: OrganizationId::new(),
            leave_type_id: LeaveTypeId::new(),
            code: "P".into(),
            name: "Policy".into(),
            description: None,
            effective_from: now - Duration::days(10),
            effective_to: None,
            accrual_frequency: AccrualFrequency::Monthly,
            accrual_amount: 1.0,
            accrual_cap: None,
            carry_forward_type: CarryForwardType::None,
            carry_forward_limit: None,
            eligibility_type: eligibility,
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
    fn immediate_policies_always_pass() {
        let engine = PolicyEngine::new();
        let user = user_with(json!({}));
        let policy = policy_with(EligibilityType::Immediate);
        assert!(engine.assert_eligible(&user, &policy, None).is_ok());
    }

    #[test]
    fn probation_gate_fails_before_the_end_date() {
        let engine = PolicyEngine::new();
        let mut user = user_with(json!({}));
        let policy = policy_with(EligibilityType::AfterProbation);

        user.probation_end_date = None;
        assert!(matches!(
            engine.assert_eligible(&user, &policy, None),
            Err(AppError::Eligibility { .. })
        ));

        user.probation_end_date = Some(Utc::now() + Duration::days(10));
        assert!(engine.assert_eligible(&user, &policy, None).is_err());

        user.probation_end_date = Some(Utc::now() - Duration::days(1));
        assert!(engine.assert_eligible(&user, &policy, None).is_ok());
    }

    #[test]
    fn tenure_gate_reports_criteria() {
        let engine = PolicyEngine::new();
        let user = user_with(json!({}));
        let mut policy = policy_with(EligibilityType::AfterTenure);
        policy.eligibility_tenure_days = Some(500);

        match engine.assert_eligible(&user, &policy, None) {
            Err(AppError::Eligibility { criteria, .. }) => {
                assert_eq!(criteria["required_days"], json!(500));
                assert!(criteria["tenure_days"].is_i64());
            }
            other => panic!("expected eligibility failure, got {:?}", other),
        }

        policy.eligibility_tenure_days = Some(100);
        assert!(engine.assert_eligible(&user, &policy, None).is_ok());
    }

    #[test]
    fn tenure_gate_fails_without_hire_date() {
        let engine = PolicyEngine::new();
        let mut user = user_with(json!({}));
        user.hire_date = None;
        let policy = policy_with(EligibilityType::AfterTenure);
        assert!(engine.assert_eligible(&user, &policy, None).is_err());
    }

    #[test]
    fn custom_rules_check_equality_and_membership() {
        let rules = json!({
            "employment_type": ["full_time", "part_time"],
            "location": "US",
        });

        let passing = json!({ "employment_type": "full_time", "location": "US" });
        assert!(evaluate_custom_rules(&rules, &passing).is_empty());

        let failing = json!({ "employment_type": "contract", "location": "US" });
        let failures = evaluate_custom_rules(&rules, &failing);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["attribute"], json!("employment_type"));
        assert_eq!(failures[0]["actual"], json!("contract"));
    }

    #[test]
    fn custom_rules_fail_on_missing_attributes() {
        let rules = json!({ "grade": "senior" });
        let failures = evaluate_custom_rules(&rules, &json!({}));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["actual"], Value::Null);
    }

    #[test]
    fn empty_or_non_object_rules_pass() {
        assert!(evaluate_custom_rules(&json!({}), &json!({})).is_empty());
        assert!(evaluate_custom_rules(&Value::Null, &json!({})).is_empty());
    }

    #[test]
    fn custom_policy_surfaces_failures_as_criteria() {
        let engine = PolicyEngine::new();
        let user = user_with(json!({ "grade": "junior" }));
        let mut policy = policy_with(EligibilityType::Custom);
        policy.eligibility_rules = Json(json!({ "grade": "senior" }));

        match engine.assert_eligible(&user, &policy, None) {
            Err(AppError::Eligibility { criteria, .. }) => {
                assert_eq!(criteria["failures"][0]["expected"], json!("senior"));
            }
            other => panic!("expected eligibility failure, got {:?}", other),
        }
    }
}
