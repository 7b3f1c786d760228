//! Request validation errors
//!
//! Handlers collect optional request fields and turn absent required ones
//! into `ValidationError::MissingField`. The display strings are part of the
//! HTTP contract (`{"error": "Missing required field: name"}`).

use std::fmt;

/// Validation error for request bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field absent (or null)
    MissingField { field: &'static str },

    /// Field present but blank
    Empty { field: &'static str },

    /// Free-form rule violation with a fixed message
    Rule { message: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "Missing required field: {}", field),
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::Rule { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Unwrap a required field or report it missing.
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { field })
}

/// Unwrap a required string field, rejecting whitespace-only values.
pub fn require_text(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let value = require(value, field)?;
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(value)
}
