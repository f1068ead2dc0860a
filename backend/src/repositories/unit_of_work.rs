//! Unit of Work: transaction lifecycle for one orchestrated operation.
//!
//! A request handler owns exactly one Unit of Work for the lifetime of an
//! orchestration. Engines receive the Unit of Work's connection and never
//! commit themselves; only the scope owner does.
//!
//! Failure semantics: dropping an uncommitted `UnitOfWork` rolls the
//! transaction back, so the natural `?`-propagation of any engine error
//! leaves the database untouched. `commit` and `rollback` consume the value,
//! which makes double completion unrepresentable.

use sqlx::postgres::PgTransaction;
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;

pub struct UnitOfWork {
    tx: PgTransaction<'static>,
}

impl UnitOfWork {
    /// Opens a transaction on a pooled connection.
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    /// The transaction handle shared by every repository and engine call
    /// inside this scope.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commits all changes made within the scope.
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Undoes all changes made within the scope.
    ///
    /// Explicit rollback is optional: dropping the Unit of Work has the same
    /// effect, but surfacing the database error here lets callers log it.
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_of_work_api_is_move_only() {
        // commit/rollback take `self`, so a completed scope cannot be reused;
        // this is the compile-time equivalent of a `_completed` flag.
        let _ = UnitOfWork::begin;
        let _ = UnitOfWork::commit;
        let _ = UnitOfWork::rollback;
    }
}
