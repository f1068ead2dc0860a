//! Typed ID wrappers for compile-time type safety.
//!
//! These types wrap UUIDs to prevent accidental mixing of different entity IDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate typed ID wrappers with common trait implementations.
macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

// Define all typed IDs
typed_id!(OrganizationId, "Unique identifier for an organization scope.");
typed_id!(UserId, "Unique identifier for a user.");
typed_id!(LeaveTypeId, "Unique identifier for a leave type.");
typed_id!(LeavePolicyId, "Unique identifier for a leave policy.");
typed_id!(LeaveBalanceId, "Unique identifier for a leave balance record.");
typed_id!(LeaveRequestId, "Unique identifier for a leave request.");
typed_id!(LeaveRequestDateId, "Unique identifier for a leave request day row.");
typed_id!(
    LeaveRequestCommentId,
    "Unique identifier for a leave request comment."
);
typed_id!(
    WorkflowConfigurationId,
    "Unique identifier for a workflow configuration."
);
typed_id!(WorkflowStepId, "Unique identifier for a workflow step.");
typed_id!(AuditLogId, "Unique identifier for an audit log entry.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_ids_round_trip_through_strings() {
        let id = LeaveRequestId::new();
        let s = id.to_string();
        let parsed: LeaveRequestId = s.parse().expect("parse id");
        assert_eq!(id, parsed);
    }

    #[test]
    fn typed_ids_serialize_as_uuid_strings() {
        let id = UserId::new();
        let value = serde_json::to_value(id).unwrap();
        assert_eq!(value, serde_json::json!(id.as_uuid().to_string()));
    }

    #[test]
    fn distinct_wrappers_share_the_raw_uuid() {
        let uuid = Uuid::new_v4();
        let user = UserId::from_uuid(uuid);
        let request = LeaveRequestId::from_uuid(uuid);
        assert_eq!(user.as_uuid(), request.as_uuid());
    }
}
