//! Repository trait and common functionality.
//!
//! Repositories are typed CRUD; they never implement domain rules. Every
//! mutating method emits exactly one audit event describing the mutation.
//! All methods execute on the caller's transaction handle, so repositories
//! hold no connections of their own.

use sqlx::PgConnection;

use crate::error::AppError;

/// Maximum limit for list queries to prevent unbounded result sets.
pub const MAX_QUERY_LIMIT: i64 = 1000;

/// Clamps a caller-supplied limit into `[0, MAX_QUERY_LIMIT]`.
pub fn effective_limit(limit: i64) -> i64 {
    limit.clamp(0, MAX_QUERY_LIMIT)
}

/// Standard repository trait for database operations.
///
/// All repository modules implement this trait to ensure consistent data
/// access patterns. `get_required` and `count` are provided.
#[allow(async_fn_in_trait)]
pub trait Repository<T> {
    /// Target table name.
    const TABLE: &'static str;
    /// Entity type name used in error details and audit rows.
    const ENTITY: &'static str;
    /// Primary key type for the record.
    type Id: std::fmt::Display + Copy + Send;

    /// Find a single record by ID; soft-deleted rows are invisible.
    async fn find_by_id(
        &self,
        conn: &mut PgConnection,
        id: Self::Id,
    ) -> Result<Option<T>, AppError>;

    /// List records with pagination; `limit` is capped at [`MAX_QUERY_LIMIT`].
    async fn list(
        &self,
        conn: &mut PgConnection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<T>, AppError>;

    /// Find a single record by ID, failing with `EntityNotFound` on a miss.
    async fn get_required(&self, conn: &mut PgConnection, id: Self::Id) -> Result<T, AppError> {
        self.find_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::EntityNotFound {
                entity_type: Self::ENTITY.to_string(),
                entity_id: id.to_string(),
            })
    }

    /// Count live records; useful for pagination metadata.
    async fn count(&self, conn: &mut PgConnection) -> Result<i64, AppError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE is_deleted = FALSE",
            Self::TABLE
        );
        let count = sqlx::query_scalar::<_, i64>(&query)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_caps_at_max() {
        assert_eq!(effective_limit(100), 100);
        assert_eq!(effective_limit(5000), MAX_QUERY_LIMIT);
        assert_eq!(effective_limit(-1), 0);
    }
}
