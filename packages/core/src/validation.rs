// ABOUTME: Input validation shared by the HTTP API and the MCP server
// ABOUTME: Field-level errors for required values, UUIDs, lengths, and enum values

use std::fmt::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::constants::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} is not a valid UUID: {value}")]
    InvalidUuid { field: String, value: String },

    #[error("invalid {field} '{value}', expected one of: {allowed}")]
    InvalidEnum {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_enum<T: Display>(field: &str, value: &str, allowed: &[T]) -> Self {
        Self::InvalidEnum {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Parse and normalise a UUID supplied by a caller
pub fn parse_uuid(field: &str, value: &str) -> Result<String, ValidationError> {
    Uuid::parse_str(value.trim())
        .map(|id| id.to_string())
        .map_err(|_| ValidationError::InvalidUuid {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Trimmed value of a required string field
pub fn require_non_empty(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(trimmed.to_string())
}

/// Validate a name/title: required, trimmed, bounded
pub fn validate_name(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = require_non_empty(field, value)?;
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(trimmed)
}

/// Validate an optional free-text description
pub fn validate_description(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LENGTH => {
            Err(ValidationError::TooLong {
                field: "description".to_string(),
                max: MAX_DESCRIPTION_LENGTH,
            })
        }
        _ => Ok(()),
    }
}

/// Validate a `#rrggbb` or `#rgb` colour
pub fn validate_hex_color(field: &str, value: &str) -> Result<(), ValidationError> {
    let hex = value
        .strip_prefix('#')
        .ok_or_else(|| ValidationError::invalid(field, "must start with '#'"))?;
    if !(hex.len() == 3 || hex.len() == 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::invalid(field, "must be a hex colour like #1e90ff"));
    }
    Ok(())
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
