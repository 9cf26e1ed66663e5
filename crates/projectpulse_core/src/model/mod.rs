//! Local domain model for projects, activities and team members.
//!
//! # Responsibility
//! - Define canonical records shared by storage, sync and analytics.
//! - Own entity-level validation rules.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Timestamps and calendar dates are Unix epoch milliseconds.
//! - `updated_at` moves forward on every persisted mutation.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod activity;
pub mod project;
pub mod user;

/// Validation failure for a single entity or analytics input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required text field is blank after trimming.
    EmptyField(&'static str),
    /// Numeric field must be strictly positive.
    NonPositive { field: &'static str, value: f64 },
    /// Numeric field must not be negative.
    Negative { field: &'static str, value: f64 },
    /// End date is earlier than start date.
    InvertedRange { start: i64, end: i64 },
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Analytics setting outside its accepted range.
    InvalidSetting { name: &'static str, message: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be greater than zero, got {value}")
            }
            Self::Negative { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::InvertedRange { start, end } => {
                write!(f, "end date {end} is earlier than start date {start}")
            }
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidSetting { name, message } => write!(f, "invalid {name}: {message}"),
        }
    }
}

impl Error for ValidationError {}

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) if value < 0.0 || value.is_nan() => {
            Err(ValidationError::Negative { field, value })
        }
        _ => Ok(()),
    }
}

pub(crate) fn require_ordered_range(
    start: Option<i64>,
    end: Option<i64>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::InvertedRange { start, end });
        }
    }
    Ok(())
}
