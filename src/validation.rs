//! Input validation for coordinates, names and other identifiers.
//!
//! Everything here runs before any state change: a request that fails
//! validation never touches the store.

/// Rejected input, with a message safe to hand back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("coordinates ({x}, {y}) are outside the {size}x{size} world")]
    OutOfRange { x: i32, y: i32, size: i32 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long (maximum {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains control characters")]
    ControlCharacters { field: &'static str },

    #[error("invalid world rules: {0}")]
    InvalidRules(String),
}

/// Maximum length accepted for character names and player identities.
pub const MAX_NAME_LENGTH: usize = 100;

/// True when `(x, y)` lies on a `size` x `size` grid anchored at the origin.
pub fn in_bounds(x: i32, y: i32, size: i32) -> bool {
    (0..size).contains(&x) && (0..size).contains(&y)
}

/// Validate a grid coordinate pair.
pub fn validate_coordinates(x: i32, y: i32, size: i32) -> Result<(), ValidationError> {
    if in_bounds(x, y, size) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { x, y, size })
    }
}

/// Validate a free-form identifier (player identity, character name).
///
/// Surrounding whitespace is trimmed; the trimmed value is returned.
pub fn validate_identifier(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::ControlCharacters { field });
    }
    Ok(trimmed.to_string())
}
