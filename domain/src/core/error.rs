//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Question too long: {len} characters (max {max})")]
    QuestionTooLong { len: usize, max: usize },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Check if this error was caused by malformed caller input
    pub fn is_validation(&self) -> bool {
        !self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_long_display() {
        let error = DomainError::QuestionTooLong { len: 6000, max: 5000 };
        assert_eq!(
            error.to_string(),
            "Question too long: 6000 characters (max 5000)"
        );
    }

    #[test]
    fn test_validation_check() {
        assert!(DomainError::InvalidQuestion("empty".to_string()).is_validation());
        assert!(DomainError::UnknownModel("gpt-0".to_string()).is_validation());
        assert!(!DomainError::Cancelled.is_validation());
        assert!(DomainError::Cancelled.is_cancelled());
    }
}
