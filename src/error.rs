use thiserror::Error;

/// Trip meter error types
#[derive(Error, Debug, Clone)]
pub enum TripMeterError {
    #[error("Trip already recording")]
    AlreadyRunning,

    #[error("Trip not recording")]
    NotRunning,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for session and storage operations
pub type TripResult<T> = Result<T, TripMeterError>;
