//! Typed CRUD over the database plus the transactional substrate.
//!
//! Repositories never hold connections; every call runs on the Unit of
//! Work's transaction handle. Mutations emit audit events; domain rules
//! live in the engines.

pub mod audit_context;
pub mod audit_log;
pub mod leave_balance;
pub mod leave_policy;
pub mod leave_request;
pub mod leave_type;
pub mod repository;
pub mod snapshot;
pub mod unit_of_work;
pub mod user;
pub mod workflow;

pub use audit_context::AuditContext;
pub use audit_log::{AuditEvent, AuditRepository};
pub use leave_balance::LeaveBalanceRepository;
pub use leave_policy::LeavePolicyRepository;
pub use leave_request::{
    LeaveRequestCommentRepository, LeaveRequestDateRepository, LeaveRequestFilters,
    LeaveRequestRepository,
};
pub use leave_type::LeaveTypeRepository;
pub use repository::{effective_limit, Repository, MAX_QUERY_LIMIT};
pub use unit_of_work::UnitOfWork;
pub use user::UserRepository;
pub use workflow::{WorkflowConfigurationRepository, WorkflowStepRepository};
