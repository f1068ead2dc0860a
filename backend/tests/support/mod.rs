#![allow(dead_code)]
//! Shared helpers for integration tests.
//!
//! Tests run against a real Postgres named by `TEST_DATABASE_URL`; when the
//! variable is unset the tests skip with a notice instead of failing, so the
//! unit suite stays runnable without infrastructure.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use lms_backend::config::Config;
use lms_backend::db::connection::create_pool;
use lms_backend::logging;

use lms_backend::models::leave_balance::LeaveBalance;
use lms_backend::models::leave_policy::{
    AccrualFrequency, CarryForwardType, EligibilityType, LeavePolicy,
};
use lms_backend::models::leave_type::{CreateLeaveType, LeaveType};
use lms_backend::models::user::{CreateUser, User};
use lms_backend::models::workflow::WorkflowConfiguration;
use lms_backend::repositories::{
    AuditContext, LeaveBalanceRepository, LeavePolicyRepository, LeaveTypeRepository,
    UserRepository, WorkflowConfigurationRepository,
};
use lms_backend::types::{
    LeaveBalanceId, LeavePolicyId, OrganizationId, UserId, WorkflowConfigurationId,
};

/// Connects to the test database and applies migrations; `None` when
/// `TEST_DATABASE_URL` is unset.
pub async fn try_test_pool() -> Option<PgPool> {
    logging::init_tracing();
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let config = Config {
        database_url: url,
        db_max_connections: 5,
        db_acquire_timeout_secs: 30,
    };
    let pool = create_pool(&config).await.expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

/// Prints the standard skip notice.
pub fn skip_notice(test: &str) {
    eprintln!("{}: TEST_DATABASE_URL not set; skipping", test);
}

pub fn system_ctx() -> AuditContext {
    AuditContext::system()
}

pub fn user_ctx(user: &User) -> AuditContext {
    AuditContext::for_user(user.id, user.organization_id)
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub async fn seed_user(
    conn: &mut PgConnection,
    organization_id: OrganizationId,
    manager_id: Option<UserId>,
) -> User {
    let suffix = short_suffix();
    let repo = UserRepository::new();
    repo.create_user(
        conn,
        &User::new(CreateUser {
            organization_id,
            employee_id: format!("E-{}", suffix),
            email: format!("user-{}@example.com", suffix),
            first_name: "Test".into(),
            last_name: format!("User-{}", suffix),
            manager_id,
            job_title: None,
            employment_type: Some("full_time".into()),
            hire_date: Some(Utc::now() - Duration::days(365)),
            probation_end_date: None,
            attributes: None,
        }),
        &system_ctx(),
    )
    .await
    .expect("seed user")
}

pub async fn seed_leave_type(
    conn: &mut PgConnection,
    organization_id: OrganizationId,
) -> LeaveType {
    let repo = LeaveTypeRepository::new();
    repo.add(
        conn,
        &LeaveType::new(CreateLeaveType {
            organization_id,
            code: format!("ANNUAL-{}", short_suffix()),
            name: "Annual Leave".into(),
            description: None,
            is_paid: true,
            requires_reason: true,
            min_days_per_request: 0.5,
            max_days_per_request: None,
        }),
        &system_ctx(),
        Some("Seed leave type"),
    )
    .await
    .expect("seed leave type")
}

pub fn build_policy(
    organization_id: OrganizationId,
    leave_type: &LeaveType,
    eligibility_type: EligibilityType,
) -> LeavePolicy {
    let now = Utc::now();
    LeavePolicy {
        id: LeavePolicyId::new(),
        organization_id,
        leave_type_id: leave_type.id,
        code: format!("POL-{}", short_suffix()),
        name: "Seed policy".into(),
        description: None,
        effective_from: now - Duration::days(365),
        effective_to: None,
        accrual_frequency: AccrualFrequency::Monthly,
        accrual_amount: 1.5,
        accrual_cap: None,
        carry_forward_type: CarryForwardType::None,
        carry_forward_limit: None,
        eligibility_type,
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

pub async fn seed_policy(
    conn: &mut PgConnection,
    organization_id: OrganizationId,
    leave_type: &LeaveType,
) -> LeavePolicy {
    let repo = LeavePolicyRepository::new();
    repo.add(
        conn,
        &build_policy(organization_id, leave_type, EligibilityType::Immediate),
        &system_ctx(),
        Some("Seed policy"),
    )
    .await
    .expect("seed policy")
}

pub async fn seed_balance(
    conn: &mut PgConnection,
    user: &User,
    leave_type: &LeaveType,
    policy: &LeavePolicy,
    opening_balance: f64,
) -> LeaveBalance {
    let now = Utc::now();
    let repo = LeaveBalanceRepository::new();
    repo.add(
        conn,
        &LeaveBalance {
            id: LeaveBalanceId::new(),
            user_id: user.id,
            leave_type_id: leave_type.id,
            policy_id: policy.id,
            period_start: period_start(),
            period_end: period_end(),
            opening_balance,
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
        },
        &system_ctx(),
        Some("Seed balance"),
    )
    .await
    .expect("seed balance")
}

/// A period wide enough to cover both `now` and the fixed 2024 scenario dates.
pub fn period_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2023-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn period_end() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2030-12-31T23:59:59Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub async fn seed_workflow(
    conn: &mut PgConnection,
    organization_id: OrganizationId,
) -> WorkflowConfiguration {
    let now = Utc::now();
    let repo = WorkflowConfigurationRepository::new();
    repo.add(
        conn,
        &WorkflowConfiguration {
            id: WorkflowConfigurationId::new(),
            organization_id,
            code: format!("WF-{}", short_suffix()),
            name: "Manager approval".into(),
            description: None,
            criteria: Json(Value::Object(Default::default())),
            priority: 10,
            effective_from: now - Duration::days(365),
            effective_to: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        },
        &system_ctx(),
        Some("Seed workflow"),
    )
    .await
    .expect("seed workflow")
}
