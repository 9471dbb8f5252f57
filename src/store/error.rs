//! Store error taxonomy.

use rusqlite::ErrorCode;
use tracing::warn;

/// Failure of a single serialized store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The tenant-scoped row targeted by a read-before-write does not exist.
    #[error("no {0} found with given ID")]
    NotFound(&'static str),

    /// A uniqueness or other constraint rejected the write. The SQLite
    /// detail is logged, never shown to clients.
    #[error("record already exists")]
    Conflict(String),

    #[error("store query failed: {0}")]
    Sqlite(rusqlite::Error),

    /// The operation queue is full and the store is configured to reject.
    #[error("store is busy, try again later")]
    Busy,

    /// The store worker has stopped.
    #[error("store is unavailable")]
    Unavailable,

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    /// Errors caused by the storage layer itself rather than by the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(_)
                | StoreError::Busy
                | StoreError::Unavailable
                | StoreError::Internal(_)
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                let detail = msg.unwrap_or_else(|| "constraint violation".to_string());
                warn!(%detail, "⚠️ Write rejected by constraint");
                StoreError::Conflict(detail)
            }
            other => StoreError::Sqlite(other),
        }
    }
}
