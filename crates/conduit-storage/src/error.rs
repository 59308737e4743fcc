// Storage error taxonomy, composed into `CoreError` at the Dispatcher
// boundary the same way `conduit_orchestrator::OrchestratorError` is.

use conduit_core::error::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => CoreError::BadInput(msg),
            other => CoreError::Internal(anyhow::anyhow!(other)),
        }
    }
}
