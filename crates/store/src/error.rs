use domain::CommerceError;
use thiserror::Error;

/// SQLSTATE codes that mean "try again": deadlock, serialization failure,
/// and lock timeout.
const CONTENTION_CODES: [&str; 3] = ["40P01", "40001", "55P03"];

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not acquire a lock or commit in time.
    /// Nothing from the failed unit of work was persisted.
    #[error("Store contention: {0}")]
    Contention(String),

    /// A uniqueness, foreign key, or check constraint rejected a write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A stored row could not be mapped back into the domain.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the failed unit of work may be retried as-is.
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Contention(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::PoolTimedOut = err {
            return StoreError::Contention("connection pool timed out".to_string());
        }

        let classified = match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string());
                if code
                    .as_deref()
                    .is_some_and(|c| CONTENTION_CODES.contains(&c))
                {
                    Some(StoreError::Contention(db.message().to_string()))
                } else if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation()
                {
                    Some(StoreError::Constraint(db.message().to_string()))
                } else {
                    None
                }
            }
            _ => None,
        };

        classified.unwrap_or(StoreError::Database(err))
    }
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Contention(msg) => CommerceError::Transient(msg),
            other => CommerceError::Internal(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
