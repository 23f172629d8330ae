//! Question value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// Upper bound on question length, counted in characters after trimming
pub const MAX_QUESTION_CHARS: usize = 5000;

/// A user question posed to the ensemble (Value Object)
///
/// The content is stored trimmed. [`Question::normalized`] gives the
/// lower-cased form used as the classification cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Question {
    content: String,
}

impl Question {
    /// Validate and create a new question
    pub fn new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidQuestion(
                "question cannot be empty".to_string(),
            ));
        }

        let len = trimmed.chars().count();
        if len > MAX_QUESTION_CHARS {
            return Err(DomainError::QuestionTooLong {
                len,
                max: MAX_QUESTION_CHARS,
            });
        }

        Ok(Self {
            content: trimmed.to_string(),
        })
    }

    /// Get the question content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Trimmed, lower-cased form used as a cache/classification key
    pub fn normalized(&self) -> String {
        self.content.to_lowercase()
    }

    /// Consume and return the inner content
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl TryFrom<String> for Question {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Question::new(s)
    }
}

impl TryFrom<&str> for Question {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Question::new(s)
    }
}

impl From<Question> for String {
    fn from(q: Question) -> Self {
        q.content
    }
}
