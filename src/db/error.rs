use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors surfaced by [`super::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the store failed while bringing the schema up to date. The
    /// store is unusable; the pending migration was rolled back.
    #[error("Schema migration failed: {0}")]
    Migration(#[source] DbErr),

    /// A uniqueness or foreign key constraint rejected a write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Refused to prune because the library root is not reachable.
    #[error("Library root is not available: {0}")]
    RootUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[source] DbErr),

    #[error("Failed to prepare database file: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(
                SqlErr::UniqueConstraintViolation(msg)
                | SqlErr::ForeignKeyConstraintViolation(msg),
            ) => Self::Constraint(msg),
            _ => Self::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
