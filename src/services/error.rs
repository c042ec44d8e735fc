//! Error type shared by the domain services, plus input validation helpers.

use uuid::Uuid;

use super::storage::StorageError;
use crate::frame::ErrorCode;
use crate::model::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("conflict: {0}")]
    Conflict(#[from] Conflict),
    #[error("task cannot move from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl ErrorCode for ServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Conflict(_) => "E_CONFLICT",
            Self::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            Self::Storage(_) => "E_STORAGE",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: i64, max: i64 },
    #[error("unknown {0}")]
    UnknownReference(&'static str),
    #[error("{0} must be a finite, non-negative amount")]
    Negative(&'static str),
    #[error("rejecting a task requires review notes")]
    RejectionNotesRequired,
    #[error("at least one photo is required before review")]
    PhotoRequired,
    #[error("invalid email")]
    InvalidEmail,
    #[error("password is too short")]
    PasswordTooShort,
    #[error("unsupported upload: {0}")]
    Upload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("worker already has an open check-in")]
    AlreadyCheckedIn,
    #[error("worker has no open check-in")]
    NoActiveCheckIn,
    #[error("issue already resolved")]
    AlreadyResolved,
    #[error("row changed concurrently")]
    StatusChanged,
}

// =============================================================================
// HELPERS
// =============================================================================

/// True when `err` is a unique violation on the named constraint or index.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.is_foreign_key_violation())
}

/// Trim a required text field, rejecting blank input.
pub(crate) fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field; blank input becomes `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

pub(crate) fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(())
}

pub(crate) fn check_amount(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::Negative(field));
    }
    Ok(())
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
