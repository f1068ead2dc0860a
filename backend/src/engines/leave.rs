//! Leave engine (orchestration).
//!
//! Orchestrates the leave request lifecycle: policy rules go through the
//! policy engine, the approval state machine through the workflow engine,
//! balance accounting through the balance engine, and every mutation through
//! repositories. Controllers call engines; engines contain no transport
//! concerns and never commit. Only the Unit of Work scope owner commits.

use chrono::Utc;
use serde::Serialize;
use sqlx::PgConnection;
use validator::Validate;

use crate::engines::balance::BalanceEngine;
use crate::engines::policy::PolicyEngine;
use crate::engines::workflow::{ApprovalOutcome, WorkflowCompleted, WorkflowEngine};
use crate::error::AppError;
use crate::models::leave_request::{
    CreateLeaveRequest, LeaveRequest, LeaveRequestComment, LeaveRequestDate, LeaveRequestStatus,
};
use crate::models::workflow::WorkflowStep;
use crate::repositories::repository::Repository;
use crate::repositories::{
    AuditContext, LeaveBalanceRepository, LeaveRequestCommentRepository,
    LeaveRequestDateRepository, LeaveRequestFilters, LeaveRequestRepository, LeaveTypeRepository,
    UserRepository, WorkflowStepRepository,
};
use crate::types::{LeaveRequestId, LeaveTypeId, UserId, WorkflowStepId};

/// Result of creating a leave request.
#[derive(Debug, Clone)]
pub struct LeaveRequestCreated {
    pub leave_request: LeaveRequest,
}

/// Per-type balance entry with the derived available amount.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveBalanceEntry {
    pub leave_type_id: LeaveTypeId,
    pub opening_balance: f64,
    pub accrued: f64,
    pub used: f64,
    pub pending: f64,
    pub adjusted: f64,
    pub carried_forward: f64,
    pub encashed: f64,
    pub expired: f64,
    pub available: f64,
}

/// All period balances of one user.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveBalanceSummary {
    pub user_id: UserId,
    pub balances: Vec<LeaveBalanceEntry>,
}

/// Maps the coarse client-side status filter onto backend statuses.
/// Unknown filters (and `all`) mean no constraint.
pub fn statuses_for_filter(filter: &str) -> Vec<LeaveRequestStatus> {
    match filter.to_ascii_lowercase().as_str() {
        "pending" => vec![
            LeaveRequestStatus::Draft,
            LeaveRequestStatus::PendingApproval,
        ],
        "approved" => vec![LeaveRequestStatus::Approved],
        "rejected" => vec![LeaveRequestStatus::Rejected],
        "withdrawn" => vec![
            LeaveRequestStatus::Withdrawn,
            LeaveRequestStatus::Cancelled,
        ],
        _ => Vec::new(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveEngine {
    user_repo: UserRepository,
    leave_type_repo: LeaveTypeRepository,
    request_repo: LeaveRequestRepository,
    date_repo: LeaveRequestDateRepository,
    comment_repo: LeaveRequestCommentRepository,
    balance_repo: LeaveBalanceRepository,
    step_repo: WorkflowStepRepository,
    policy_engine: PolicyEngine,
    workflow_engine: WorkflowEngine,
    balance_engine: BalanceEngine,
}

impl LeaveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a leave request in DRAFT.
    ///
    /// Validates the window, rejects overlaps with the user's requests that
    /// still occupy the calendar, resolves the policy and asserts
    /// eligibility, then persists the request plus one row per day.
    pub async fn create_leave_request(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        data: CreateLeaveRequest,
        ctx: &AuditContext,
    ) -> Result<LeaveRequestCreated, AppError> {
        data.validate()?;

        let user = self.user_repo.get_required(&mut *conn, user_id).await?;
        if !user.is_active() {
            return Err(AppError::InactiveUser {
                user_id: user.id.to_string(),
            });
        }

        let leave_type = self
            .leave_type_repo
            .get_required(&mut *conn, data.leave_type_id)
            .await?;
        if leave_type.requires_reason
            && data.reason.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(AppError::Validation(vec![format!(
                "reason: required for leave type {}",
                leave_type.code
            )]));
        }
        if data.total_days < leave_type.min_days_per_request {
            return Err(AppError::Validation(vec![format!(
                "total_days: below the minimum of {} for leave type {}",
                leave_type.min_days_per_request, leave_type.code
            )]));
        }
        if let Some(max) = leave_type.max_days_per_request {
            if data.total_days > max {
                return Err(AppError::Validation(vec![format!(
                    "total_days: above the maximum of {} for leave type {}",
                    max, leave_type.code
                )]));
            }
        }

        let overlaps = self
            .request_repo
            .find_overlaps(&mut *conn, user.id, data.start_date, data.end_date)
            .await?;
        if !overlaps.is_empty() {
            return Err(AppError::LeaveOverlap {
                overlapping: overlaps.iter().map(|r| r.id.to_string()).collect(),
            });
        }

        let resolution = self
            .policy_engine
            .resolve_policy_for_user(&mut *conn, &user, leave_type.id, None)
            .await?;
        self.policy_engine
            .assert_eligible(&user, &resolution.policy, None)?;

        let request = LeaveRequest::new(
            user.id,
            leave_type.id,
            resolution.policy.id,
            data.start_date,
            data.end_date,
            data.total_days,
            data.reason,
        );
        let request = self
            .request_repo
            .add(&mut *conn, &request, ctx, Some("Create leave request"))
            .await?;

        // One row per day in the inclusive window; holiday tagging is a
        // calendar-collaborator concern.
        let mut cursor = data.start_date;
        while cursor <= data.end_date {
            let day = LeaveRequestDate::new(request.id, cursor);
            self.date_repo
                .add(&mut *conn, &day, ctx, Some("Add leave request day"))
                .await?;
            cursor = match cursor.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        tracing::info!(
            request_number = %request.request_number,
            user_id = %user.id,
            total_days = request.total_days,
            "leave request created"
        );
        Ok(LeaveRequestCreated {
            leave_request: request,
        })
    }

    /// Submits a leave request and instantiates its workflow.
    ///
    /// 1. Verify the request is DRAFT (under a row lock)
    /// 2. Resolve the applicable workflow definition
    /// 3. Determine approvers from the owner's manager
    /// 4. Instantiate workflow steps
    /// 5. Reserve the balance
    /// 6. Transition to PENDING_APPROVAL
    ///
    /// If the reservation fails the whole Unit of Work rolls back, so no
    /// workflow steps survive a failed submit.
    pub async fn submit(
        &self,
        conn: &mut PgConnection,
        request_id: LeaveRequestId,
        ctx: &AuditContext,
    ) -> Result<LeaveRequest, AppError> {
        let request = self
            .request_repo
            .get_required_for_update(&mut *conn, request_id)
            .await?;

        if request.status != LeaveRequestStatus::Draft {
            return Err(AppError::WorkflowState {
                current_state: request.status.db_value().into(),
                attempted_action: "submit (only DRAFT requests can be submitted)".into(),
            });
        }

        let user = self
            .user_repo
            .get_required(&mut *conn, request.user_id)
            .await?;

        // Approvers: the owner's manager. A richer chain would come from the
        // workflow definition's criteria.
        let approver_ids: Vec<UserId> = user.manager_id.into_iter().collect();
        if approver_ids.is_empty() {
            return Err(AppError::WorkflowNotFound {
                leave_type: Some(request.leave_type_id.to_string()),
            });
        }

        let resolution = self
            .workflow_engine
            .resolve_workflow(&mut *conn, user.organization_id, &request, None)
            .await?;
        self.workflow_engine
            .instantiate_steps(&mut *conn, &request, &resolution.workflow, &approver_ids, ctx)
            .await?;

        self.balance_engine.on_submit(&mut *conn, &request, ctx).await?;

        let before = request.clone();
        let mut request = request;
        request.mark_submitted(Utc::now());
        let request = self
            .request_repo
            .update(
                conn,
                &before,
                &request,
                ctx,
                Some("Submit leave request (workflow instantiated)"),
            )
            .await?;

        tracing::info!(
            request_number = %request.request_number,
            "leave request submitted for approval"
        );
        Ok(request)
    }

    /// Approves a workflow step; on final approval the reserved balance is
    /// consumed.
    pub async fn approve_step(
        &self,
        conn: &mut PgConnection,
        step_id: WorkflowStepId,
        actor_user_id: UserId,
        comment: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<ApprovalOutcome, AppError> {
        let outcome = self
            .workflow_engine
            .approve(&mut *conn, step_id, actor_user_id, comment, ctx)
            .await?;

        if let ApprovalOutcome::Completed(completed) = &outcome {
            self.balance_engine
                .on_approve(&mut *conn, &completed.leave_request, ctx)
                .await?;
        }
        Ok(outcome)
    }

    /// Rejects a workflow step and releases the reservation.
    pub async fn reject_step(
        &self,
        conn: &mut PgConnection,
        step_id: WorkflowStepId,
        actor_user_id: UserId,
        comment: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<WorkflowCompleted, AppError> {
        let completed = self
            .workflow_engine
            .reject(&mut *conn, step_id, actor_user_id, comment, ctx)
            .await?;
        self.balance_engine
            .on_reject(&mut *conn, &completed.leave_request, ctx)
            .await?;
        Ok(completed)
    }

    /// Withdraws a pending request (owner only) and releases the
    /// reservation.
    pub async fn withdraw_request(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
        actor_user_id: UserId,
        reason: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<WorkflowCompleted, AppError> {
        let completed = self
            .workflow_engine
            .withdraw(&mut *conn, leave_request_id, actor_user_id, reason, ctx)
            .await?;
        self.balance_engine
            .on_withdraw(&mut *conn, &completed.leave_request, ctx)
            .await?;
        Ok(completed)
    }

    /// Persists a comment; request state is untouched.
    pub async fn add_comment(
        &self,
        conn: &mut PgConnection,
        request_id: LeaveRequestId,
        user_id: UserId,
        comment: String,
        is_internal: bool,
        ctx: &AuditContext,
    ) -> Result<LeaveRequestComment, AppError> {
        let request = self.request_repo.get_required(&mut *conn, request_id).await?;
        let comment = LeaveRequestComment::new(request.id, user_id, comment, is_internal);
        self.comment_repo
            .add(conn, &comment, ctx, Some("Add leave request comment"))
            .await
    }

    pub async fn get_leave_request(
        &self,
        conn: &mut PgConnection,
        request_id: LeaveRequestId,
    ) -> Result<LeaveRequest, AppError> {
        self.request_repo.get_required(conn, request_id).await
    }

    pub async fn get_workflow_step(
        &self,
        conn: &mut PgConnection,
        step_id: WorkflowStepId,
    ) -> Result<WorkflowStep, AppError> {
        self.step_repo.get_required(conn, step_id).await
    }

    /// Lists leave requests, optionally filtered by user and coarse status.
    pub async fn list_leave_requests(
        &self,
        conn: &mut PgConnection,
        user_id: Option<UserId>,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let filters = LeaveRequestFilters {
            user_id,
            statuses: status.map(statuses_for_filter).unwrap_or_default(),
        };
        self.request_repo
            .list_filtered(conn, &filters, limit, offset)
            .await
    }

    /// Counts leave requests under the same filters as the listing.
    pub async fn count_leave_requests(
        &self,
        conn: &mut PgConnection,
        user_id: Option<UserId>,
        status: Option<&str>,
    ) -> Result<i64, AppError> {
        let filters = LeaveRequestFilters {
            user_id,
            statuses: status.map(statuses_for_filter).unwrap_or_default(),
        };
        self.request_repo.count_filtered(conn, &filters).await
    }

    /// All period balances of a user with the derived available amount.
    pub async fn get_leave_balance(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<LeaveBalanceSummary, AppError> {
        let balances = self.balance_repo.list_for_user(conn, user_id).await?;
        Ok(LeaveBalanceSummary {
            user_id,
            balances: balances
                .into_iter()
                .map(|b| LeaveBalanceEntry {
                    leave_type_id: b.leave_type_id,
                    opening_balance: b.opening_balance,
                    accrued: b.accrued,
                    used: b.used,
                    pending: b.pending,
                    adjusted: b.adjusted,
                    carried_forward: b.carried_forward,
                    encashed: b.encashed,
                    expired: b.expired,
                    available: b.available(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_maps_coarse_labels() {
        assert_eq!(
            statuses_for_filter("pending"),
            vec![
                LeaveRequestStatus::Draft,
                LeaveRequestStatus::PendingApproval
            ]
        );
        assert_eq!(
            statuses_for_filter("Withdrawn"),
            vec![
                LeaveRequestStatus::Withdrawn,
                LeaveRequestStatus::Cancelled
            ]
        );
        assert!(statuses_for_filter("all").is_empty());
        assert!(statuses_for_filter("").is_empty());
        assert!(statuses_for_filter("nonsense").is_empty());
    }
}
