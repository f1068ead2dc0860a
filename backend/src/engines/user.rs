//! User engine.
//!
//! Keeps controllers thin and centralizes user-related domain decisions.

use sqlx::PgConnection;
use validator::Validate;

use crate::error::AppError;
use crate::models::user::{CreateUser, User};
use crate::repositories::repository::Repository;
use crate::repositories::{AuditContext, UserRepository};
use crate::types::UserId;

/// Result of creating a user.
#[derive(Debug, Clone)]
pub struct UserCreated {
    pub user: User,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserEngine {
    user_repo: UserRepository,
}

impl UserEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a user after validation and uniqueness pre-checks.
    pub async fn create_user(
        &self,
        conn: &mut PgConnection,
        data: CreateUser,
        ctx: &AuditContext,
    ) -> Result<UserCreated, AppError> {
        data.validate()?;
        let user = User::new(data);
        let user = self.user_repo.create_user(conn, &user, ctx).await?;
        Ok(UserCreated { user })
    }

    pub async fn get_user(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<User, AppError> {
        self.user_repo.get_required(conn, user_id).await
    }
}
