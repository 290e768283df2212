//! Error types surfaced by the coordinator

use luaguard_core::ObfuscateError;

/// Failure of one coordinated obfuscation
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Empty source or unrecognized variant/preset; nothing was attempted
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The remote transformer could not be reached and no fallback ran
    #[error("Remote transformer unavailable: {0}")]
    Transport(String),

    /// The remote transformer refused the input itself
    #[error("Remote transformer rejected the input ({status}): {message}")]
    ServerRejected {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// Any other non-success answer from the remote transformer
    #[error("Remote transformer failed ({status}): {message}")]
    Server { status: u16, message: String },

    /// A local pass could not complete
    #[error("Local pipeline failed: {0}")]
    InternalPass(#[source] ObfuscateError),
}

impl From<ObfuscateError> for CoordinatorError {
    fn from(err: ObfuscateError) -> Self {
        match err {
            ObfuscateError::Validation(message) => CoordinatorError::Validation(message),
            other => CoordinatorError::InternalPass(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
