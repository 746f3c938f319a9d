use thiserror::Error;

/// Errors raised by the store handle itself (pool setup, schema, transactions).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database configuration error: {0}")]
    Config(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Database transaction error: {0}")]
    Transaction(String),
}
