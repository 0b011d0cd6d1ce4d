use std::time::Duration;

use thiserror::Error;

/// Crate-level error for configuration loading and system assembly.
#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse system configuration JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),

    #[error("Invalid reservation: {0}")]
    InvalidReservationError(String),

    #[error("No server with id {0} is configured")]
    UnknownServerError(i64),

    #[error(transparent)]
    BackendError(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Faults raised while talking to a remote lab backend.
///
/// Every transport or protocol failure is classified into exactly one of
/// these variants at the call site, so callers only ever see a structured
/// outcome. The variants carry enough context (server address, lab id,
/// operation) to diagnose the failure from the log alone.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The server did not accept a connection at all.
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// The request exceeded its bounded network timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the configured credential pair.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A lab or node vanished between listing it and commanding it.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Some but not all node operations inside one lab succeeded.
    ///
    /// Reported as a failure even though part of the work was done; the
    /// next scheduler tick re-evaluates the lab and retries the remainder.
    #[error("{} of {total} node operations failed: {}", .failed.len(), .failed.join(", "))]
    PartialFailure { total: usize, failed: Vec<String> },

    /// The backend reported a state outside the known raw vocabulary.
    #[error("Unmapped backend state: {0}")]
    UnknownState(String),

    /// Catch-all for faults none of the other variants describe.
    #[error("Backend error: {0}")]
    Unknown(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl BackendError {
    /// Classifies a transport-level fault from the HTTP client.
    ///
    /// Status-code classification is done at the call site instead, since
    /// only the caller knows which operation the response belongs to.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout)
        } else if err.is_connect() {
            BackendError::Unreachable(err.to_string())
        } else {
            BackendError::Unknown(err.to_string())
        }
    }

    /// Classifies a non-success HTTP status for the operation in `context`.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 | 403 => BackendError::InvalidCredentials(context.to_string()),
            404 => BackendError::NotFound(context.to_string()),
            _ => BackendError::Unknown(format!("{context}: unexpected status {status}")),
        }
    }
}
