//! Typed errors for the recommendation engine.
//!
//! Application plumbing (stores, config, HTTP) uses `anyhow`; the types here
//! are the ones callers need to match on.

use thiserror::Error;

/// Failure of an embedding backend.
///
/// Always recoverable inside the recommender: any `ProviderError` switches
/// the current call to the token-overlap fallback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// The backend is not usable in this process (e.g. missing API key).
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// Network failure, timeout, or non-success HTTP status.
    #[error("embedding request failed: {0}")]
    Request(String),

    /// The backend answered but the payload held no usable vector.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Two vectors of different lengths were compared.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("embedding dimension mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Reason the embedding strategy could not score a candidate set.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),
}

/// One or more field constraints were violated.
///
/// The message joins every violation with `", "`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Builds an error from collected messages, or `Ok(())` when there are none.
    pub fn check(messages: Vec<String>) -> Result<(), ValidationError> {
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(messages.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_check_joins_messages() {
        let err = ValidationError::check(vec!["a is required".into(), "b too long".into()])
            .unwrap_err();
        assert_eq!(err.to_string(), "a is required, b too long");
    }

    #[test]
    fn test_validation_check_empty_is_ok() {
        assert!(ValidationError::check(Vec::new()).is_ok());
    }

    #[test]
    fn test_scoring_error_wraps_provider() {
        let err: ScoringError = ProviderError::Request("timeout".into()).into();
        assert!(err.to_string().contains("timeout"));
    }
}
