//! Activity domain model.
//!
//! # Invariants
//! - Every activity belongs to exactly one project.
//! - `estimated_hours` is strictly positive.

use super::project::ProjectId;
use super::user::UserId;
use super::{require_non_negative, require_ordered_range, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an activity.
pub type ActivityId = Uuid;

/// Estimated hours used when the source does not provide a usable value.
pub const DEFAULT_ESTIMATED_HOURS: f64 = 8.0;

/// Activity lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Canonical activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    pub status: ActivityStatus,
    pub estimated_hours: f64,
    pub actual_hours: Option<f64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    /// `None` when an externally sourced assignee could not be resolved.
    pub assignee_id: Option<UserId>,
    pub external_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Activity {
    /// Creates a pending activity under `project_id` with a generated id.
    pub fn new(
        project_id: ProjectId,
        name: impl Into<String>,
        estimated_hours: f64,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            description: String::new(),
            status: ActivityStatus::Pending,
            estimated_hours,
            actual_hours: None,
            start_date: None,
            end_date: None,
            assignee_id: None,
            external_id: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("activity name", &self.name)?;
        if self.estimated_hours.is_nan() || self.estimated_hours <= 0.0 {
            return Err(ValidationError::NonPositive {
                field: "estimated hours",
                value: self.estimated_hours,
            });
        }
        require_non_negative("actual hours", self.actual_hours)?;
        require_ordered_range(self.start_date, self.end_date)
    }

    /// Open activities still count towards delivery risk.
    pub fn is_open(&self) -> bool {
        self.status != ActivityStatus::Completed
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = self.updated_at.max(now_ms);
    }
}
