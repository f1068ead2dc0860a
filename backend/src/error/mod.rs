//! Domain error taxonomy.
//!
//! Every failure an engine or repository can surface is a variant here, each
//! carrying a stable error code plus structured details. Controllers map the
//! taxonomy onto HTTP responses through [`IntoResponse`]; engines never
//! swallow errors, so any `Err` reaching the Unit of Work scope owner means
//! rollback.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{entity_type} not found: {entity_id}")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    #[error("{entity_type} with {field}={value} already exists")]
    DuplicateEntity {
        entity_type: String,
        field: String,
        value: String,
    },

    #[error("no active policy found for leave type {leave_type_id}")]
    PolicyNotFound { leave_type_id: String },

    #[error("eligibility not met: {message}")]
    Eligibility { message: String, criteria: Value },

    #[error("insufficient {leave_type} balance: {available} available, {requested} requested")]
    InsufficientBalance {
        available: f64,
        requested: f64,
        leave_type: String,
    },

    #[error("no applicable workflow found")]
    WorkflowNotFound { leave_type: Option<String> },

    #[error("invalid state transition: cannot {attempted_action} from {current_state}")]
    WorkflowState {
        current_state: String,
        attempted_action: String,
    },

    #[error("{message}")]
    Approval {
        message: String,
        actor_id: Option<String>,
    },

    #[error("leave dates overlap with existing requests")]
    LeaveOverlap { overlapping: Vec<String> },

    #[error("user account is not active")]
    InactiveUser { user_id: String },

    #[error("validation failed")]
    Validation(Vec<String>),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code carried alongside the HTTP status.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            AppError::DuplicateEntity { .. } => "DUPLICATE_ENTITY",
            AppError::PolicyNotFound { .. } => "POLICY_NOT_FOUND",
            AppError::Eligibility { .. } => "ELIGIBILITY_NOT_MET",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::WorkflowNotFound { .. } => "WORKFLOW_NOT_FOUND",
            AppError::WorkflowState { .. } => "INVALID_STATE_TRANSITION",
            AppError::Approval { .. } => "APPROVAL_FAILED",
            AppError::LeaveOverlap { .. } => "LEAVE_OVERLAP",
            AppError::InactiveUser { .. } => "INACTIVE_USER",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured details suitable for the JSON error body.
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::EntityNotFound {
                entity_type,
                entity_id,
            } => Some(json!({ "entity_type": entity_type, "entity_id": entity_id })),
            AppError::DuplicateEntity {
                entity_type,
                field,
                value,
            } => Some(json!({ "entity_type": entity_type, "field": field, "value": value })),
            AppError::PolicyNotFound { leave_type_id } => {
                Some(json!({ "leave_type_id": leave_type_id }))
            }
            AppError::Eligibility { criteria, .. } => Some(json!({ "criteria": criteria })),
            AppError::InsufficientBalance {
                available,
                requested,
                leave_type,
            } => Some(json!({
                "available": available,
                "requested": requested,
                "leave_type": leave_type,
            })),
            AppError::WorkflowNotFound { leave_type } => {
                Some(json!({ "leave_type": leave_type }))
            }
            AppError::WorkflowState {
                current_state,
                attempted_action,
            } => Some(json!({
                "current_state": current_state,
                "attempted_action": attempted_action,
            })),
            AppError::Approval { actor_id, .. } => Some(json!({ "approver_id": actor_id })),
            AppError::LeaveOverlap { overlapping } => {
                Some(json!({ "overlapping_requests": overlapping }))
            }
            AppError::InactiveUser { user_id } => Some(json!({ "user_id": user_id })),
            AppError::Validation(errors) => Some(json!({ "errors": errors })),
            AppError::Database(_) | AppError::Internal(_) => None,
        }
    }

    /// Whether this is a Postgres serialization/deadlock failure.
    ///
    /// The Unit of Work rolls back on such failures; the outer request
    /// handler may retry the whole operation at most once. Engines never
    /// retry themselves.
    pub fn is_serialization_conflict(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |error| format!("{}: {}", field, error.code))
            })
            .collect();
        AppError::Validation(messages)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::WorkflowState { .. } | AppError::DuplicateEntity { .. } => {
                StatusCode::CONFLICT
            }
            AppError::Approval { .. } => StatusCode::FORBIDDEN,
            AppError::PolicyNotFound { .. }
            | AppError::Eligibility { .. }
            | AppError::InsufficientBalance { .. }
            | AppError::WorkflowNotFound { .. }
            | AppError::LeaveOverlap { .. }
            | AppError::InactiveUser { .. }
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (error_message, details) = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Internal server error");
            ("Internal server error".to_string(), None)
        } else {
            (self.to_string(), self.details())
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: self.error_code().to_string(),
            details,
        });

        (status, body).into_response()
    }
}
