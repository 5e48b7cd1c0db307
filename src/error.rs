//! Error types for the Storage Pool Selector
//!
//! Provides structured error types for capability flattening, requirement
//! expression parsing and evaluation, pool selection, and the upstream
//! pool registry.

use thiserror::Error;

/// Unified error type for the selector
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Capability Errors
    // =========================================================================
    #[error("Capability document is not a nested key-value document at '{path}': {reason}")]
    Flatten { path: String, reason: String },

    // =========================================================================
    // Requirement Expression Errors
    // =========================================================================
    #[error("The format of {key}: {expression} is incorrect: {reason}")]
    Format {
        key: String,
        expression: String,
        reason: String,
    },

    #[error("Type mismatch for {key}: expected {expected}, pool provides {actual}")]
    TypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    // =========================================================================
    // Selection Errors
    // =========================================================================
    #[error("No available pool to meet requirements: {requirements}")]
    NoAvailablePool { requirements: String },

    #[error("Invalid selection request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Registry Errors
    // =========================================================================
    #[error("Pool registry error: {0}")]
    Registry(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an error for upstream layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing fits; the request itself was valid
    NoMatch,
    /// The caller's request or requirement map is malformed
    InvalidRequest,
    /// The upstream pool registry failed
    Upstream,
    /// Engine or configuration fault
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoAvailablePool { .. } => ErrorKind::NoMatch,

            Error::Format { .. }
            | Error::TypeMismatch { .. }
            | Error::InvalidRequest(_) => ErrorKind::InvalidRequest,

            // A pool record the registry handed us is broken
            Error::Flatten { .. }
            | Error::Registry(_)
            | Error::Io(_)
            | Error::JsonParse(_)
            | Error::YamlParse(_) => ErrorKind::Upstream,

            Error::Configuration(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error means no pool satisfied the requirements
    pub fn is_no_match(&self) -> bool {
        self.kind() == ErrorKind::NoMatch
    }

    /// Check if retrying the same selection could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::NoMatch | ErrorKind::Upstream)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Registry(_) | Error::Io(_))
    }

    pub(crate) fn format(key: &str, expression: &str, reason: impl Into<String>) -> Self {
        Error::Format {
            key: key.to_string(),
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(key: &str, expected: &str, actual: &str) -> Self {
        Error::TypeMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type alias for the selector
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::NoAvailablePool {
            requirements: "{size: 10}".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NoMatch);
        assert!(err.is_no_match());

        let err = Error::format("freeCapacity", "<=", "missing operand");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!err.is_no_match());

        let err = Error::type_mismatch("thin", "bool", "string");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::Registry("connection refused".into());
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let malformed = Error::format("size", "<in>", "missing operand");
        assert!(!malformed.is_retryable());
        assert!(!malformed.is_transient());
    }

    #[test]
    fn test_format_message() {
        let err = Error::format("freeCapacity", "<=", "missing operand");
        assert_eq!(
            err.to_string(),
            "The format of freeCapacity: <= is incorrect: missing operand"
        );
    }
}
