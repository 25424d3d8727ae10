// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the captioning core can raise. All of them are
// programmer or configuration mistakes, so none is retried:
//
//   Configuration — a required hyperparameter could not be resolved
//   Validation    — a value is outside its allowed set or range
//   Usage         — the API was called out of order (e.g. before build)
//   ShapeMismatch — tensors handed to a stage disagree in shape
//
// The application and CLI layers wrap these in anyhow::Error.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Shape mismatch in {stage}: expected {expected}, got {actual}")]
    ShapeMismatch {
        stage:    &'static str,
        expected: String,
        actual:   String,
    },
}

impl CaptionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn shape(stage: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            stage,
            expected: expected.to_string(),
            actual:   actual.to_string(),
        }
    }

    /// Shape mismatches are misuse of the built unit, so they count as usage errors.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::ShapeMismatch { .. })
    }
}

pub type CaptionResult<T> = Result<T, CaptionError>;
