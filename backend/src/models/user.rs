//! Models that represent employees and their reporting hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::repositories::snapshot::{
    id_value, opt_id_value, opt_string_value, opt_timestamp_value, timestamp_value, AuditEntity,
    Snapshot,
};
use crate::types::{OrganizationId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of an employee record.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Organization scope the user belongs to.
    pub organization_id: OrganizationId,
    /// Immutable employee number, unique per deployment.
    pub employee_id: String,
    /// Work email address, unique per deployment.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Reporting manager; the first workflow approver is resolved from here.
    pub manager_id: Option<UserId>,
    pub job_title: Option<String>,
    /// Employment category such as `full_time` or `contract`.
    pub employment_type: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    pub probation_end_date: Option<DateTime<Utc>>,
    pub termination_date: Option<DateTime<Utc>>,
    /// Account lifecycle status; only ACTIVE users may open new requests.
    pub status: UserStatus,
    /// Free-form attributes consumed by custom eligibility rules.
    pub attributes: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
/// User account status.
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Terminated,
}

impl UserStatus {
    pub fn db_value(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
            UserStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
/// Payload used to create a new user.
pub struct CreateUser {
    pub organization_id: OrganizationId,
    #[validate(length(min = 1, max = 50))]
    pub employee_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub manager_id: Option<UserId>,
    pub job_title: Option<String>,
    pub employment_type: Option<String>,
    pub hire_date: Option<DateTime<Utc>>,
    pub probation_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

impl User {
    /// Constructs an active user from the inbound payload.
    pub fn new(data: CreateUser) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            organization_id: data.organization_id,
            employee_id: data.employee_id,
            email: data.email,
            first_name: data.first_name,
            last_name: data.last_name,
            manager_id: data.manager_id,
            job_title: data.job_title,
            employment_type: data.employment_type,
            hire_date: data.hire_date,
            probation_end_date: data.probation_end_date,
            termination_date: None,
            status: UserStatus::Active,
            attributes: Json(data.attributes.unwrap_or_else(|| Value::Object(Default::default()))),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns `true` when the account may act on new leave requests.
    pub fn is_active(&self) -> bool {
        matches!(self.status, UserStatus::Active)
    }

    pub fn is_on_probation(&self, at: DateTime<Utc>) -> bool {
        match self.probation_end_date {
            Some(end) => at < end,
            None => false,
        }
    }
}

impl AuditEntity for User {
    const ENTITY_TYPE: &'static str = "User";

    fn audit_entity_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("id".into(), id_value(self.id));
        snap.insert("organization_id".into(), id_value(self.organization_id));
        snap.insert("employee_id".into(), self.employee_id.clone().into());
        snap.insert("email".into(), self.email.clone().into());
        snap.insert("first_name".into(), self.first_name.clone().into());
        snap.insert("last_name".into(), self.last_name.clone().into());
        snap.insert("manager_id".into(), opt_id_value(self.manager_id));
        snap.insert("job_title".into(), opt_string_value(&self.job_title));
        snap.insert(
            "employment_type".into(),
            opt_string_value(&self.employment_type),
        );
        snap.insert("hire_date".into(), opt_timestamp_value(&self.hire_date));
        snap.insert(
            "probation_end_date".into(),
            opt_timestamp_value(&self.probation_end_date),
        );
        snap.insert(
            "termination_date".into(),
            opt_timestamp_value(&self.termination_date),
        );
        snap.insert("status".into(), self.status.db_value().into());
        snap.insert("attributes".into(), self.attributes.0.clone());
        snap.insert("created_at".into(), timestamp_value(&self.created_at));
        snap.insert("updated_at".into(), timestamp_value(&self.updated_at));
        snap.insert("is_deleted".into(), self.is_deleted.into());
        snap.insert("deleted_at".into(), opt_timestamp_value(&self.deleted_at));
        snap
    }
}
