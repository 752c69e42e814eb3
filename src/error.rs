//! Error types for the PIN lock

use thiserror::Error;

/// Result type alias for lock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors that can occur while configuring or verifying the lock
#[derive(Debug, Error)]
pub enum LockError {
    /// PIN is not 4 to 8 ASCII digits
    #[error("PIN must be 4–8 digits.")]
    InvalidFormat,

    /// Dummy PIN equals the main PIN
    #[error("Dummy PIN should be different from the main PIN.")]
    DuplicateCredential,

    /// A dummy PIN needs a main PIN to exist first
    #[error("Set a main PIN before adding a dummy PIN.")]
    MissingRealCredential,

    /// Candidate matched no stored credential
    #[error("Incorrect PIN")]
    VerificationMismatch,

    /// Credential storage could not be read or written
    #[error("Credential storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::StorageUnavailable(err.to_string())
    }
}
