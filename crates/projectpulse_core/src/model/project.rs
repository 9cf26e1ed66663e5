//! Project domain model.
//!
//! # Responsibility
//! - Define the canonical project record and its lifecycle vocabulary.
//! - Carry the latest recorded viability assessment.
//!
//! # Invariants
//! - `external_id`, when set, identifies at most one local project.
//! - `viability_score` is always within `0..=100`.
//! - `end_date` is not earlier than `start_date` when both are set.

use super::user::UserId;
use super::{require_non_negative, require_ordered_range, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for a project.
pub type ProjectId = Uuid;

/// Project lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Proposed,
    Approved,
    InProgress,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proposed" => Some(Self::Proposed),
            "approved" => Some(Self::Approved),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the project still consumes team capacity.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Business priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl ProjectPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Coarse risk classification derived from score and budget/time ratios.
///
/// Ordered from least to most severe so `max` picks the worse level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Medium and high projects count as "at risk" on dashboards.
    pub fn is_at_risk(self) -> bool {
        self >= Self::Medium
    }
}

/// Canonical project record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub budget: Option<f64>,
    /// Not required to stay below `budget`; overspend shows up in ratios.
    pub budget_executed: Option<f64>,
    /// `None` only for externally sourced projects with an unresolved owner.
    pub owner_id: Option<UserId>,
    pub team_ids: BTreeSet<UserId>,
    pub external_id: Option<String>,
    pub viability_score: Option<u8>,
    pub risk_level: Option<RiskLevel>,
    pub recommendations: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    /// Creates a proposed, medium-priority project with a generated id.
    pub fn new(name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            status: ProjectStatus::Proposed,
            priority: ProjectPriority::Medium,
            start_date: None,
            end_date: None,
            budget: None,
            budget_executed: None,
            owner_id: None,
            team_ids: BTreeSet::new(),
            external_id: None,
            viability_score: None,
            risk_level: None,
            recommendations: Vec::new(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Checks field-level invariants before persistence or analysis.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("project name", &self.name)?;
        require_non_negative("budget", self.budget)?;
        require_non_negative("executed budget", self.budget_executed)?;
        require_ordered_range(self.start_date, self.end_date)?;
        if let Some(score) = self.viability_score {
            if score > 100 {
                return Err(ValidationError::InvalidSetting {
                    name: "viability score",
                    message: format!("{score} is outside 0..=100"),
                });
            }
        }
        Ok(())
    }

    /// Executed budget as a fraction of budget, `None` without a positive budget.
    pub fn budget_execution_ratio(&self) -> Option<f64> {
        match self.budget {
            Some(budget) if budget > 0.0 => Some(self.budget_executed.unwrap_or(0.0) / budget),
            _ => None,
        }
    }

    /// Fraction of the planned schedule elapsed at `now_ms`, clamped to `0..=1`.
    pub fn elapsed_ratio(&self, now_ms: i64) -> Option<f64> {
        let (start, end) = (self.start_date?, self.end_date?);
        if now_ms <= start {
            return Some(0.0);
        }
        if now_ms >= end || end == start {
            return Some(1.0);
        }
        Some((now_ms - start) as f64 / (end - start) as f64)
    }

    /// Bumps `updated_at`, keeping it monotonic.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = self.updated_at.max(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::{Project, ProjectStatus, RiskLevel};
    use crate::model::ValidationError;

    #[test]
    fn new_project_starts_proposed_and_valid() {
        let project = Project::new("LMS upgrade", 1_000);
        assert_eq!(project.status, ProjectStatus::Proposed);
        assert_eq!(project.created_at, 1_000);
        project.validate().unwrap();
    }

    #[test]
    fn validate_rejects_blank_name_and_inverted_dates() {
        let mut project = Project::new("   ", 0);
        assert_eq!(
            project.validate(),
            Err(ValidationError::EmptyField("project name"))
        );

        project.name = "Metrics".to_string();
        project.start_date = Some(10);
        project.end_date = Some(5);
        assert!(matches!(
            project.validate(),
            Err(ValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn budget_ratio_needs_positive_budget() {
        let mut project = Project::new("Budgeted", 0);
        assert_eq!(project.budget_execution_ratio(), None);
        project.budget = Some(200.0);
        project.budget_executed = Some(50.0);
        assert_eq!(project.budget_execution_ratio(), Some(0.25));
    }

    #[test]
    fn elapsed_ratio_is_clamped() {
        let mut project = Project::new("Timed", 0);
        project.start_date = Some(100);
        project.end_date = Some(200);
        assert_eq!(project.elapsed_ratio(50), Some(0.0));
        assert_eq!(project.elapsed_ratio(150), Some(0.5));
        assert_eq!(project.elapsed_ratio(500), Some(1.0));
    }

    #[test]
    fn risk_levels_order_by_severity() {
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium.is_at_risk());
        assert!(!RiskLevel::Low.is_at_risk());
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut project = Project::new("Clock", 500);
        project.touch(100);
        assert_eq!(project.updated_at, 500);
        project.touch(900);
        assert_eq!(project.updated_at, 900);
    }
}
