//! Workflow engine (config-driven state machine).
//!
//! Responsibilities:
//! - Resolve applicable workflow definitions
//! - Instantiate workflow steps on leave submission
//! - Enforce state machine transitions (approve/reject/withdraw)
//! - Keep workflow and leave request state consistent
//!
//! State invariants are strict: only the step at the request's cursor can be
//! actioned, only the assigned approver can action it, completed or rejected
//! workflows accept nothing further, and every violation surfaces as a
//! domain error.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_request::{LeaveRequest, LeaveRequestStatus};
use crate::models::workflow::{WorkflowConfiguration, WorkflowStep, WorkflowStepStatus};
use crate::repositories::repository::Repository;
use crate::repositories::{
    AuditContext, LeaveRequestRepository, WorkflowConfigurationRepository, WorkflowStepRepository,
};
use crate::types::{LeaveRequestId, OrganizationId, UserId, WorkflowStepId};

/// Outcome of workflow resolution.
#[derive(Debug, Clone)]
pub struct WorkflowResolution {
    pub workflow: WorkflowConfiguration,
    pub reason: String,
}

/// A non-final approval advanced the cursor to this step.
#[derive(Debug, Clone)]
pub struct StepActivated {
    pub step: WorkflowStep,
    pub is_final: bool,
}

/// The workflow reached a terminal request status.
#[derive(Debug, Clone)]
pub struct WorkflowCompleted {
    pub leave_request: LeaveRequest,
    pub final_status: LeaveRequestStatus,
}

/// Result of an approval: either the next step was activated or the
/// workflow completed with the request approved.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    StepActivated(StepActivated),
    Completed(WorkflowCompleted),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowEngine {
    workflow_repo: WorkflowConfigurationRepository,
    step_repo: WorkflowStepRepository,
    request_repo: LeaveRequestRepository,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the workflow definition applicable to a leave request:
    /// the active workflow with the highest priority whose effective window
    /// covers the instant.
    pub async fn resolve_workflow(
        &self,
        conn: &mut PgConnection,
        organization_id: OrganizationId,
        leave_request: &LeaveRequest,
        at: Option<DateTime<Utc>>,
    ) -> Result<WorkflowResolution, AppError> {
        let at = at.unwrap_or_else(Utc::now);
        let workflows = self
            .workflow_repo
            .list_active_for_org(conn, organization_id, at)
            .await?;

        match workflows.into_iter().next() {
            Some(workflow) => Ok(WorkflowResolution {
                workflow,
                reason: "Highest priority active workflow".into(),
            }),
            None => Err(AppError::WorkflowNotFound {
                leave_type: Some(leave_request.leave_type_id.to_string()),
            }),
        }
    }

    /// Creates ordered step instances for a leave request.
    ///
    /// Step orders are `0..n-1`; the first step starts PENDING (the cursor),
    /// the rest QUEUED. Each creation is audited.
    pub async fn instantiate_steps(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        workflow: &WorkflowConfiguration,
        approver_ids_in_order: &[UserId],
        ctx: &AuditContext,
    ) -> Result<Vec<WorkflowStep>, AppError> {
        if approver_ids_in_order.is_empty() {
            return Err(AppError::WorkflowState {
                current_state: "workflow_definition".into(),
                attempted_action: "instantiate with no approvers".into(),
            });
        }

        tracing::debug!(
            workflow = %workflow.code,
            request_number = %leave_request.request_number,
            approvers = approver_ids_in_order.len(),
            "instantiating workflow steps"
        );

        let mut created = Vec::with_capacity(approver_ids_in_order.len());
        for (idx, approver_id) in approver_ids_in_order.iter().enumerate() {
            let step = WorkflowStep::new(leave_request.id, idx as i32, *approver_id);
            let step = self
                .step_repo
                .add(
                    conn,
                    &step,
                    ctx,
                    Some(&format!("Instantiate workflow step {}", idx)),
                )
                .await?;
            created.push(step);
        }
        Ok(created)
    }

    /// Approves the step at the cursor and activates the next step, or
    /// completes the workflow when this was the final step.
    pub async fn approve(
        &self,
        conn: &mut PgConnection,
        step_id: WorkflowStepId,
        actor_user_id: UserId,
        comment: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<ApprovalOutcome, AppError> {
        let step = self.step_repo.get_required(&mut *conn, step_id).await?;
        let leave_request = self
            .request_repo
            .get_required_for_update(&mut *conn, step.leave_request_id)
            .await?;

        self.check_actionable(&step, &leave_request, actor_user_id, "approve")?;

        let now = Utc::now();
        let before_step = step.clone();
        let mut step = step;
        step.mark_approved(comment.map(str::to_string), now);
        let step = self
            .step_repo
            .update(conn, &before_step, &step, ctx, Some("Approve workflow step"))
            .await?;

        let all_steps = self
            .step_repo
            .list_for_request(&mut *conn, leave_request.id)
            .await?;
        let current_idx = all_steps
            .iter()
            .position(|s| s.id == step.id)
            .ok_or_else(|| AppError::Approval {
                message: "Step not found in leave request's workflow steps".into(),
                actor_id: Some(actor_user_id.to_string()),
            })?;

        if current_idx + 1 < all_steps.len() {
            let next = all_steps[current_idx + 1].clone();
            let before_next = next.clone();
            let mut next = next;
            next.mark_pending(now);
            let next = self
                .step_repo
                .update(
                    conn,
                    &before_next,
                    &next,
                    ctx,
                    Some("Activate next workflow step"),
                )
                .await?;

            let before_request = leave_request.clone();
            let mut leave_request = leave_request;
            leave_request.advance_cursor(next.step_order, now);
            self.request_repo
                .update(
                    conn,
                    &before_request,
                    &leave_request,
                    ctx,
                    Some("Advance workflow cursor"),
                )
                .await?;

            Ok(ApprovalOutcome::StepActivated(StepActivated {
                step: next,
                is_final: false,
            }))
        } else {
            let before_request = leave_request.clone();
            let mut leave_request = leave_request;
            leave_request.mark_approved(actor_user_id, comment.map(str::to_string), now);
            let leave_request = self
                .request_repo
                .update(
                    conn,
                    &before_request,
                    &leave_request,
                    ctx,
                    Some("Approve leave request (final workflow step)"),
                )
                .await?;

            Ok(ApprovalOutcome::Completed(WorkflowCompleted {
                leave_request,
                final_status: LeaveRequestStatus::Approved,
            }))
        }
    }

    /// Rejects the step at the cursor and terminates the workflow; trailing
    /// steps stay QUEUED (logically dead).
    pub async fn reject(
        &self,
        conn: &mut PgConnection,
        step_id: WorkflowStepId,
        actor_user_id: UserId,
        comment: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<WorkflowCompleted, AppError> {
        let step = self.step_repo.get_required(&mut *conn, step_id).await?;
        let leave_request = self
            .request_repo
            .get_required_for_update(&mut *conn, step.leave_request_id)
            .await?;

        self.check_actionable(&step, &leave_request, actor_user_id, "reject")?;

        let now = Utc::now();
        let before_step = step.clone();
        let mut step = step;
        step.mark_rejected(comment.map(str::to_string), now);
        self.step_repo
            .update(conn, &before_step, &step, ctx, Some("Reject workflow step"))
            .await?;

        let before_request = leave_request.clone();
        let mut leave_request = leave_request;
        leave_request.mark_rejected(actor_user_id, comment.map(str::to_string), now);
        let leave_request = self
            .request_repo
            .update(
                conn,
                &before_request,
                &leave_request,
                ctx,
                Some("Reject leave request"),
            )
            .await?;

        Ok(WorkflowCompleted {
            leave_request,
            final_status: LeaveRequestStatus::Rejected,
        })
    }

    /// Withdraws a pending request; only the owner may do so. Every open
    /// step is swept to SKIPPED.
    pub async fn withdraw(
        &self,
        conn: &mut PgConnection,
        leave_request_id: LeaveRequestId,
        actor_user_id: UserId,
        reason: Option<&str>,
        ctx: &AuditContext,
    ) -> Result<WorkflowCompleted, AppError> {
        let leave_request = self
            .request_repo
            .get_required_for_update(&mut *conn, leave_request_id)
            .await?;

        if leave_request.user_id != actor_user_id {
            return Err(AppError::Approval {
                message: format!(
                    "Only leave request owner (user {}) can withdraw",
                    leave_request.user_id
                ),
                actor_id: Some(actor_user_id.to_string()),
            });
        }
        if leave_request.status != LeaveRequestStatus::PendingApproval {
            return Err(AppError::WorkflowState {
                current_state: leave_request.status.db_value().into(),
                attempted_action: "withdraw leave request (only allowed while PENDING_APPROVAL)"
                    .into(),
            });
        }

        let now = Utc::now();
        let before_request = leave_request.clone();
        let mut leave_request = leave_request;
        leave_request.mark_withdrawn(actor_user_id, reason.map(str::to_string), now);
        let leave_request = self
            .request_repo
            .update(
                conn,
                &before_request,
                &leave_request,
                ctx,
                Some("Withdraw leave request"),
            )
            .await?;

        let open_steps = self
            .step_repo
            .list_open_for_request(&mut *conn, leave_request.id)
            .await?;
        for step in open_steps {
            let before = step.clone();
            let mut step = step;
            step.mark_skipped(now);
            self.step_repo
                .update(
                    conn,
                    &before,
                    &step,
                    ctx,
                    Some("Skip open workflow step (request withdrawn)"),
                )
                .await?;
        }

        Ok(WorkflowCompleted {
            leave_request,
            final_status: LeaveRequestStatus::Withdrawn,
        })
    }

    /// Shared preconditions for approve/reject: assigned approver, step at
    /// the cursor in PENDING, request awaiting approval.
    fn check_actionable(
        &self,
        step: &WorkflowStep,
        leave_request: &LeaveRequest,
        actor_user_id: UserId,
        action: &str,
    ) -> Result<(), AppError> {
        if step.approver_id != actor_user_id {
            return Err(AppError::Approval {
                message: format!(
                    "Only assigned approver (user {}) can {} this step",
                    step.approver_id, action
                ),
                actor_id: Some(actor_user_id.to_string()),
            });
        }
        if step.status != WorkflowStepStatus::Pending {
            return Err(AppError::WorkflowState {
                current_state: step.status.db_value().into(),
                attempted_action: format!("{} step (expected PENDING)", action),
            });
        }
        if leave_request.status != LeaveRequestStatus::PendingApproval {
            return Err(AppError::WorkflowState {
                current_state: leave_request.status.db_value().into(),
                attempted_action: format!("{} step on non-pending leave request", action),
            });
        }
        if step.step_order != leave_request.current_workflow_step {
            return Err(AppError::WorkflowState {
                current_state: format!(
                    "cursor_at_step_{}",
                    leave_request.current_workflow_step
                ),
                attempted_action: format!("{} step {} out of order", action, step.step_order),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LeavePolicyId, LeaveTypeId};
    use chrono::NaiveDate;

    fn pending_request() -> LeaveRequest {
        let mut request = LeaveRequest::new(
            UserId::new(),
            LeaveTypeId::new(),
            LeavePolicyId::new(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
            3.0,
            None,
        );
        request.mark_submitted(Utc::now());
        request
    }

    #[test]
    fn non_assigned_actor_cannot_action_a_step() {
        let engine = WorkflowEngine::new();
        let request = pending_request();
        let step = WorkflowStep::new(request.id, 0, UserId::new());

        let err = engine
            .check_actionable(&step, &request, UserId::new(), "approve")
            .unwrap_err();
        assert!(matches!(err, AppError::Approval { .. }));
    }

    #[test]
    fn queued_steps_cannot_be_actioned() {
        let engine = WorkflowEngine::new();
        let request = pending_request();
        let approver = UserId::new();
        let step = WorkflowStep::new(request.id, 1, approver);

        let err = engine
            .check_actionable(&step, &request, approver, "approve")
            .unwrap_err();
        match err {
            AppError::WorkflowState { current_state, .. } => {
                assert_eq!(current_state, "queued");
            }
            other => panic!("expected state error, got {:?}", other),
        }
    }

    #[test]
    fn steps_of_decided_requests_cannot_be_actioned() {
        let engine = WorkflowEngine::new();
        let mut request = pending_request();
        let approver = UserId::new();
        let step = WorkflowStep::new(request.id, 0, approver);

        request.mark_rejected(approver, None, Utc::now());
        let err = engine
            .check_actionable(&step, &request, approver, "reject")
            .unwrap_err();
        assert!(matches!(err, AppError::WorkflowState { .. }));
    }

    #[test]
    fn cursor_mismatch_is_a_state_error() {
        let engine = WorkflowEngine::new();
        let mut request = pending_request();
        request.advance_cursor(1, Utc::now());
        let approver = UserId::new();
        // Step 0 is PENDING but the cursor moved past it.
        let step = WorkflowStep::new(request.id, 0, approver);

        let err = engine
            .check_actionable(&step, &request, approver, "approve")
            .unwrap_err();
        assert!(matches!(err, AppError::WorkflowState { .. }));
    }
}
