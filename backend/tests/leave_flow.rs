//! End-to-end lifecycle scenarios for the leave engines.

use chrono::NaiveDate;
use sqlx::PgPool;

use lms_backend::engines::workflow::ApprovalOutcome;
use lms_backend::engines::LeaveEngine;
use lms_backend::error::AppError;
use lms_backend::models::leave_policy::LeavePolicy;
use lms_backend::models::leave_request::{CreateLeaveRequest, LeaveRequest, LeaveRequestStatus};
use lms_backend::models::leave_type::LeaveType;
use lms_backend::models::user::User;
use lms_backend::models::workflow::{WorkflowStep, WorkflowStepStatus};
use lms_backend::repositories::{
    LeaveBalanceRepository, LeaveRequestDateRepository, UnitOfWork, WorkflowStepRepository,
};
use lms_backend::types::OrganizationId;

#[path = "support/mod.rs"]
mod support;

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

struct Fixture {
    user: User,
    manager: User,
    leave_type: LeaveType,
    policy: LeavePolicy,
}

async fn fixture(pool: &PgPool, opening_balance: f64) -> Fixture {
    let mut uow = UnitOfWork::begin(pool).await.expect("begin");
    let org = OrganizationId::new();
    let manager = support::seed_user(uow.conn(), org, None).await;
    let user = support::seed_user(uow.conn(), org, Some(manager.id)).await;
    let leave_type = support::seed_leave_type(uow.conn(), org).await;
    let policy = support::seed_policy(uow.conn(), org, &leave_type).await;
    support::seed_balance(uow.conn(), &user, &leave_type, &policy, opening_balance).await;
    support::seed_workflow(uow.conn(), org).await;
    uow.commit().await.expect("commit seeds");
    Fixture {
        user,
        manager,
        leave_type,
        policy,
    }
}

async fn create_request(pool: &PgPool, fixture: &Fixture) -> LeaveRequest {
    let engine = LeaveEngine::new();
    let mut uow = UnitOfWork::begin(pool).await.expect("begin");
    let created = engine
        .create_leave_request(
            uow.conn(),
            fixture.user.id,
            CreateLeaveRequest {
                leave_type_id: fixture.leave_type.id,
                start_date: d(2024, 2, 1),
                end_date: d(2024, 2, 3),
                total_days: 3.0,
                reason: Some("vac".into()),
            },
            &support::user_ctx(&fixture.user),
        )
        .await
        .expect("create leave request");
    uow.commit().await.expect("commit create");
    created.leave_request
}

async fn submit_request(pool: &PgPool, fixture: &Fixture, request: &LeaveRequest) -> WorkflowStep {
    let engine = LeaveEngine::new();
    let mut uow = UnitOfWork::begin(pool).await.expect("begin");
    let submitted = engine
        .submit(uow.conn(), request.id, &support::user_ctx(&fixture.user))
        .await
        .expect("submit leave request");
    assert_eq!(submitted.status, LeaveRequestStatus::PendingApproval);
    let steps = WorkflowStepRepository::new()
        .list_for_request(uow.conn(), request.id)
        .await
        .expect("list steps");
    uow.commit().await.expect("commit submit");

    let pending: Vec<_> = steps
        .iter()
        .filter(|s| s.status == WorkflowStepStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1, "exactly one PENDING step after submit");
    pending[0].clone()
}

async fn current_balance(
    pool: &PgPool,
    fixture: &Fixture,
) -> lms_backend::models::leave_balance::LeaveBalance {
    let mut uow = UnitOfWork::begin(pool).await.expect("begin");
    let balance = LeaveBalanceRepository::new()
        .find_current(
            uow.conn(),
            fixture.user.id,
            fixture.leave_type.id,
            support::period_start(),
        )
        .await
        .expect("query balance")
        .expect("balance row");
    uow.rollback().await.expect("rollback");
    balance
}

#[tokio::test]
async fn happy_path_single_approver_approval() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("happy_path_single_approver_approval");
        return;
    };
    let fixture = fixture(&pool, 20.0).await;

    let request = create_request(&pool, &fixture).await;
    assert_eq!(request.status, LeaveRequestStatus::Draft);
    assert!(request.request_number.starts_with("LR-"));
    assert_eq!(request.policy_id, Some(fixture.policy.id));

    // One row per day in the window.
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let days = LeaveRequestDateRepository::new()
        .list_for_request(uow.conn(), request.id)
        .await
        .expect("list days");
    uow.rollback().await.expect("rollback");
    assert_eq!(days.len(), 3);
    assert_eq!(days[0].leave_date, d(2024, 2, 1));
    assert_eq!(days[2].leave_date, d(2024, 2, 3));

    let step = submit_request(&pool, &fixture, &request).await;
    assert_eq!(step.approver_id, fixture.manager.id);

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let fetched_step = LeaveEngine::new()
        .get_workflow_step(uow.conn(), step.id)
        .await
        .expect("fetch step");
    uow.rollback().await.expect("rollback");
    assert_eq!(fetched_step.step_order, 0);

    let reserved = current_balance(&pool, &fixture).await;
    assert_eq!(reserved.pending, 3.0);
    assert_eq!(reserved.available(), 17.0);

    // Manager approves the single step: workflow completes.
    let engine = LeaveEngine::new();
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let outcome = engine
        .approve_step(
            uow.conn(),
            step.id,
            fixture.manager.id,
            Some("ok"),
            &support::user_ctx(&fixture.manager),
        )
        .await
        .expect("approve step");
    uow.commit().await.expect("commit approve");

    match outcome {
        ApprovalOutcome::Completed(completed) => {
            assert_eq!(completed.final_status, LeaveRequestStatus::Approved);
            assert_eq!(
                completed.leave_request.decided_by,
                Some(fixture.manager.id)
            );
            assert!(completed.leave_request.decided_at.is_some());
        }
        other => panic!("expected completion, got {:?}", other),
    }

    let consumed = current_balance(&pool, &fixture).await;
    assert_eq!(consumed.pending, 0.0);
    assert_eq!(consumed.used, 3.0);
    assert_eq!(consumed.available(), 17.0);
}

#[tokio::test]
async fn reject_releases_reservation() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("reject_releases_reservation");
        return;
    };
    let fixture = fixture(&pool, 20.0).await;
    let request = create_request(&pool, &fixture).await;
    let step = submit_request(&pool, &fixture, &request).await;
    assert_eq!(current_balance(&pool, &fixture).await.pending, 3.0);

    let engine = LeaveEngine::new();
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let completed = engine
        .reject_step(
            uow.conn(),
            step.id,
            fixture.manager.id,
            Some("no"),
            &support::user_ctx(&fixture.manager),
        )
        .await
        .expect("reject step");
    uow.commit().await.expect("commit reject");

    assert_eq!(completed.final_status, LeaveRequestStatus::Rejected);

    let released = current_balance(&pool, &fixture).await;
    assert_eq!(released.pending, 0.0);
    assert_eq!(released.used, 0.0);
    assert_eq!(released.available(), 20.0);
}

#[tokio::test]
async fn withdraw_by_owner_skips_steps() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("withdraw_by_owner_skips_steps");
        return;
    };
    let fixture = fixture(&pool, 20.0).await;
    let request = create_request(&pool, &fixture).await;
    submit_request(&pool, &fixture, &request).await;

    let engine = LeaveEngine::new();

    // A non-owner cannot withdraw.
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let err = engine
        .withdraw_request(
            uow.conn(),
            request.id,
            fixture.manager.id,
            Some("not mine"),
            &support::user_ctx(&fixture.manager),
        )
        .await
        .expect_err("non-owner withdrawal must fail");
    assert!(matches!(err, AppError::Approval { .. }));
    drop(uow); // roll back the failed attempt

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let completed = engine
        .withdraw_request(
            uow.conn(),
            request.id,
            fixture.user.id,
            Some("changed mind"),
            &support::user_ctx(&fixture.user),
        )
        .await
        .expect("withdraw request");
    uow.commit().await.expect("commit withdraw");
    assert_eq!(completed.final_status, LeaveRequestStatus::Withdrawn);
    assert_eq!(
        completed.leave_request.cancellation_reason.as_deref(),
        Some("changed mind")
    );

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let steps = WorkflowStepRepository::new()
        .list_for_request(uow.conn(), request.id)
        .await
        .expect("list steps");
    uow.rollback().await.expect("rollback");
    assert!(!steps.is_empty());
    assert!(steps
        .iter()
        .all(|s| s.status == WorkflowStepStatus::Skipped));

    let released = current_balance(&pool, &fixture).await;
    assert_eq!(released.pending, 0.0);
    assert_eq!(released.used, 0.0);
}

#[tokio::test]
async fn multi_step_workflow_advances_cursor() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("multi_step_workflow_advances_cursor");
        return;
    };
    let fixture = fixture(&pool, 20.0).await;
    let request = create_request(&pool, &fixture).await;

    // Two approvers in order: the manager, then a second reviewer.
    let engine = lms_backend::engines::WorkflowEngine::new();
    let leave_engine = LeaveEngine::new();
    let balance_engine = lms_backend::engines::BalanceEngine::new();

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let reviewer = support::seed_user(uow.conn(), fixture.user.organization_id, None).await;
    let resolution = engine
        .resolve_workflow(uow.conn(), fixture.user.organization_id, &request, None)
        .await
        .expect("resolve workflow");
    let steps = engine
        .instantiate_steps(
            uow.conn(),
            &request,
            &resolution.workflow,
            &[fixture.manager.id, reviewer.id],
            &support::user_ctx(&fixture.user),
        )
        .await
        .expect("instantiate steps");
    balance_engine
        .on_submit(uow.conn(), &request, &support::user_ctx(&fixture.user))
        .await
        .expect("reserve balance");
    // Transition the request to PENDING_APPROVAL the same way submit does.
    let repo = lms_backend::repositories::LeaveRequestRepository::new();
    let before = request.clone();
    let mut pending = request.clone();
    pending.mark_submitted(chrono::Utc::now());
    repo.update(
        uow.conn(),
        &before,
        &pending,
        &support::user_ctx(&fixture.user),
        Some("Submit leave request (workflow instantiated)"),
    )
    .await
    .expect("mark submitted");
    uow.commit().await.expect("commit submit");

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].status, WorkflowStepStatus::Pending);
    assert_eq!(steps[1].status, WorkflowStepStatus::Queued);

    // The second step cannot be approved before the first.
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let err = leave_engine
        .approve_step(
            uow.conn(),
            steps[1].id,
            reviewer.id,
            None,
            &support::user_ctx(&reviewer),
        )
        .await
        .expect_err("out-of-order approval must fail");
    assert!(matches!(err, AppError::WorkflowState { .. }));
    drop(uow);

    // First approval activates the second step.
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let outcome = leave_engine
        .approve_step(
            uow.conn(),
            steps[0].id,
            fixture.manager.id,
            Some("fine by me"),
            &support::user_ctx(&fixture.manager),
        )
        .await
        .expect("first approval");
    uow.commit().await.expect("commit first approval");

    match outcome {
        ApprovalOutcome::StepActivated(activated) => {
            assert!(!activated.is_final);
            assert_eq!(activated.step.id, steps[1].id);
            assert_eq!(activated.step.status, WorkflowStepStatus::Pending);
        }
        other => panic!("expected step activation, got {:?}", other),
    }

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let req = leave_engine
        .get_leave_request(uow.conn(), request.id)
        .await
        .expect("reload request");
    uow.rollback().await.expect("rollback");
    assert_eq!(req.status, LeaveRequestStatus::PendingApproval);
    assert_eq!(req.current_workflow_step, 1);

    // Second approval completes the workflow and consumes the balance.
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let outcome = leave_engine
        .approve_step(
            uow.conn(),
            steps[1].id,
            reviewer.id,
            Some("approved"),
            &support::user_ctx(&reviewer),
        )
        .await
        .expect("final approval");
    uow.commit().await.expect("commit final approval");

    assert!(matches!(outcome, ApprovalOutcome::Completed(_)));
    let consumed = current_balance(&pool, &fixture).await;
    assert_eq!(consumed.pending, 0.0);
    assert_eq!(consumed.used, 3.0);
}
