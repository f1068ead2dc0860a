//! Business-logic engines.
//!
//! Engines own the domain rules and compose repositories; they hold no
//! transaction handles of their own and never commit. Every operation runs
//! on the Unit of Work's connection.

pub mod audit;
pub mod balance;
pub mod leave;
pub mod policy;
pub mod user;
pub mod workflow;

pub use audit::AuditEngine;
pub use balance::BalanceEngine;
pub use leave::{LeaveBalanceEntry, LeaveBalanceSummary, LeaveEngine, LeaveRequestCreated};
pub use policy::{PolicyEngine, PolicyResolution};
pub use user::{UserCreated, UserEngine};
pub use workflow::{
    ApprovalOutcome, StepActivated, WorkflowCompleted, WorkflowEngine, WorkflowResolution,
};
