//! Error types for the local obfuscation pipeline

/// Errors raised by request validation and the local passes
#[derive(Debug, thiserror::Error)]
pub enum ObfuscateError {
    /// The request was rejected before any pass ran
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The scanner reached a newline or end of input inside a short string
    #[error("Unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },

    /// The scanner reached end of input inside a long comment
    #[error("Unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    /// A configuration table could not be used
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ObfuscateError {
    /// True for errors caused by the request itself rather than a pass
    pub fn is_validation(&self) -> bool {
        matches!(self, ObfuscateError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ObfuscateError>;
