//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when building domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Debounce threshold must be at least one reading
    #[error("Invalid close threshold: {0} (expected >= 1)")]
    InvalidThreshold(u32),

    /// Watched inhibitor owner name is empty
    #[error("Inhibitor owner for {role} must not be empty")]
    EmptyOwner { role: String },

    /// Both watched owners resolve to the same process name
    #[error("Media-key owner and power owner must differ (both are {0})")]
    DuplicateOwner(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            DomainError::InvalidThreshold(0).to_string(),
            "Invalid close threshold: 0 (expected >= 1)"
        );
        assert!(DomainError::DuplicateOwner("gsd-power".to_string())
            .to_string()
            .contains("gsd-power"));
    }
}
