//! Dashboard metric aggregation.
//!
//! Metrics are re-derived from the current project rows on every call; the
//! at-risk count recomputes each project's risk rather than reading the level
//! stored by its last assessment.

use super::risk::current_risk;
use crate::config::ScoringConfig;
use crate::model::project::{Project, ProjectStatus};
use serde::Serialize;

const EXECUTION_WARNING_RATIO: f64 = 0.8;
const AT_RISK_DANGER_COUNT: usize = 2;

/// Portfolio totals for the dashboard. Ratios are fractions in `0..=1`
/// except `execution_ratio`, which exceeds 1 on overspend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub total_projects: usize,
    pub active_projects: usize,
    pub completed_projects: usize,
    pub total_budget: f64,
    pub executed_budget: f64,
    pub execution_ratio: f64,
    pub at_risk_projects: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTone {
    Neutral,
    Success,
    Warning,
    Danger,
}

/// Labelled value ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
    pub tone: CardTone,
}

impl MetricCard {
    fn new(label: &str, value: String, tone: CardTone) -> Self {
        Self {
            label: label.to_string(),
            value,
            tone,
        }
    }
}

/// Aggregates dashboard metrics at `now_ms`. Empty input yields zeros.
pub fn compute_metrics(
    projects: &[Project],
    now_ms: i64,
    config: &ScoringConfig,
) -> PortfolioMetrics {
    let total_projects = projects.len();
    let active_projects = projects
        .iter()
        .filter(|project| project.status == ProjectStatus::InProgress)
        .count();
    let completed_projects = projects
        .iter()
        .filter(|project| project.status == ProjectStatus::Completed)
        .count();
    let total_budget: f64 = projects.iter().filter_map(|project| project.budget).sum();
    let executed_budget: f64 = projects
        .iter()
        .filter_map(|project| project.budget_executed)
        .sum();
    let at_risk_projects = projects
        .iter()
        .filter(|project| current_risk(project, now_ms, config).is_at_risk())
        .count();

    PortfolioMetrics {
        total_projects,
        active_projects,
        completed_projects,
        total_budget,
        executed_budget,
        execution_ratio: if total_budget > 0.0 {
            executed_budget / total_budget
        } else {
            0.0
        },
        at_risk_projects,
        success_rate: if total_projects > 0 {
            completed_projects as f64 / total_projects as f64
        } else {
            0.0
        },
    }
}

impl PortfolioMetrics {
    pub fn cards(&self) -> Vec<MetricCard> {
        let execution_tone = if self.execution_ratio > EXECUTION_WARNING_RATIO {
            CardTone::Warning
        } else {
            CardTone::Neutral
        };
        let risk_tone = if self.at_risk_projects > AT_RISK_DANGER_COUNT {
            CardTone::Danger
        } else {
            CardTone::Neutral
        };

        vec![
            MetricCard::new(
                "Active projects",
                self.active_projects.to_string(),
                CardTone::Neutral,
            ),
            MetricCard::new(
                "Budget execution",
                format!("{:.0}%", self.execution_ratio * 100.0),
                execution_tone,
            ),
            MetricCard::new(
                "At-risk projects",
                self.at_risk_projects.to_string(),
                risk_tone,
            ),
            MetricCard::new(
                "Success rate",
                format!("{:.0}%", self.success_rate * 100.0),
                CardTone::Success,
            ),
        ]
    }
}
