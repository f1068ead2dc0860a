//! Balance engine (leave balance accounting).
//!
//! State machine tied to workflow actions:
//! - on submit:   AVAILABLE -> PENDING  (reserve)
//! - on approve:  PENDING -> USED       (consume)
//! - on reject:   PENDING -> AVAILABLE  (release)
//! - on withdraw: PENDING -> AVAILABLE  (release)
//!
//! `used` only ever increases, and no balance mutation happens without an
//! audit event. Submit fails hard on insufficient balance; reject and
//! withdraw degrade to logged no-ops when the balance row is missing or was
//! adjusted underneath the reservation.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::leave_request::LeaveRequest;
use crate::repositories::repository::Repository;
use crate::repositories::{
    AuditContext, LeaveBalanceRepository, LeavePolicyRepository, LeaveTypeRepository,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct BalanceEngine {
    balance_repo: LeaveBalanceRepository,
    policy_repo: LeavePolicyRepository,
    leave_type_repo: LeaveTypeRepository,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl BalanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the requested days: `pending += total_days`.
    ///
    /// The balance row is locked after the leave request row (fixed lock
    /// order). The reservation floor is zero unless the resolved policy
    /// allows a negative balance.
    pub async fn on_submit(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let requested = leave_request.total_days;
        let balance = self
            .balance_repo
            .find_current_for_update(
                &mut *conn,
                leave_request.user_id,
                leave_request.leave_type_id,
                start_of_day(leave_request.start_date),
            )
            .await?;

        let Some(balance) = balance else {
            return Err(AppError::InsufficientBalance {
                available: 0.0,
                requested,
                leave_type: self.leave_type_code(conn, leave_request).await?,
            });
        };

        let floor = match leave_request.policy_id {
            Some(policy_id) => self
                .policy_repo
                .find_by_id(&mut *conn, policy_id)
                .await?
                .map(|policy| policy.balance_floor())
                .unwrap_or(0.0),
            None => 0.0,
        };

        let available = balance.available();
        if available - requested < floor {
            return Err(AppError::InsufficientBalance {
                available,
                requested,
                leave_type: self.leave_type_code(conn, leave_request).await?,
            });
        }

        let mut after = balance.clone();
        after.pending += requested;
        after.updated_at = Utc::now();
        self.balance_repo
            .update(
                conn,
                &balance,
                &after,
                ctx,
                Some(&format!(
                    "Reserve {} days for leave request {}",
                    requested, leave_request.request_number
                )),
            )
            .await?;
        Ok(())
    }

    /// Consumes the reservation: `pending -= total_days; used += total_days`.
    ///
    /// `on_submit` guarantees the reservation, so a shortfall here is an
    /// internal invariant breach, not a user error.
    pub async fn on_approve(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let requested = leave_request.total_days;
        let balance = self
            .balance_repo
            .find_current_for_update(
                &mut *conn,
                leave_request.user_id,
                leave_request.leave_type_id,
                start_of_day(leave_request.start_date),
            )
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow!(
                    "no balance found for user {} leave type {}",
                    leave_request.user_id,
                    leave_request.leave_type_id
                ))
            })?;

        if balance.pending < requested {
            return Err(AppError::Internal(anyhow!(
                "balance invariant violated: pending {} < requested {}",
                balance.pending,
                requested
            )));
        }

        let mut after = balance.clone();
        after.pending -= requested;
        after.used += requested;
        after.updated_at = Utc::now();
        self.balance_repo
            .update(
                conn,
                &balance,
                &after,
                ctx,
                Some(&format!(
                    "Approve leave request {}: move {} days from PENDING to USED",
                    leave_request.request_number, requested
                )),
            )
            .await?;
        Ok(())
    }

    /// Releases the reservation on rejection: `pending -= total_days`.
    pub async fn on_reject(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        self.release(
            conn,
            leave_request,
            ctx,
            &format!(
                "Reject leave request {}: release {} days from PENDING",
                leave_request.request_number, leave_request.total_days
            ),
        )
        .await
    }

    /// Releases the reservation on withdrawal: `pending -= total_days`.
    pub async fn on_withdraw(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        ctx: &AuditContext,
    ) -> Result<(), AppError> {
        self.release(
            conn,
            leave_request,
            ctx,
            &format!(
                "Withdraw leave request {}: release {} days from PENDING",
                leave_request.request_number, leave_request.total_days
            ),
        )
        .await
    }

    async fn release(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
        ctx: &AuditContext,
        description: &str,
    ) -> Result<(), AppError> {
        let requested = leave_request.total_days;
        let balance = self
            .balance_repo
            .find_current_for_update(
                &mut *conn,
                leave_request.user_id,
                leave_request.leave_type_id,
                start_of_day(leave_request.start_date),
            )
            .await?;

        let Some(balance) = balance else {
            tracing::warn!(
                request_number = %leave_request.request_number,
                "no balance row to release; skipping"
            );
            return Ok(());
        };

        if balance.pending < requested {
            // The balance may have been adjusted manually; releasing would
            // push pending negative, so skip.
            tracing::warn!(
                request_number = %leave_request.request_number,
                pending = balance.pending,
                requested,
                "pending below reservation; skipping release"
            );
            return Ok(());
        }

        let mut after = balance.clone();
        after.pending -= requested;
        after.updated_at = Utc::now();
        self.balance_repo
            .update(conn, &balance, &after, ctx, Some(description))
            .await?;
        Ok(())
    }

    async fn leave_type_code(
        &self,
        conn: &mut PgConnection,
        leave_request: &LeaveRequest,
    ) -> Result<String, AppError> {
        Ok(self
            .leave_type_repo
            .find_by_id(conn, leave_request.leave_type_id)
            .await?
            .map(|lt| lt.code)
            .unwrap_or_else(|| "unknown".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_of_day_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let ts = start_of_day(date);
        assert_eq!(ts.to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }
}
