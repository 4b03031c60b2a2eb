use thiserror::Error;

/// Error type for database operations
#[derive(Error, Debug)]
pub enum DbError {
    /// Error from SeaORM
    #[error("Database error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),
    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// Query error
    #[error("Query error: {0}")]
    QueryError(String),
    /// Stored row could not be mapped back into a record
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<sea_orm::TransactionError<DbError>> for DbError {
    fn from(err: sea_orm::TransactionError<DbError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => DbError::SeaOrmError(e),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}
