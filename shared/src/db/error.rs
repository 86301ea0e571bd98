use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("migration failed: {0}")]
    Migration(String),
}
