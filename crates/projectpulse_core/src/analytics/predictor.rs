//! Portfolio-level risk prediction.
//!
//! # Responsibility
//! - Derive overload, delay and budget signals from a portfolio snapshot.
//! - Combine them into one overall risk score and preventive actions.
//!
//! # Invariants
//! - Every signal probability is within `0..=1`.
//! - `overall_score` is the impact-weighted mean of all evaluated signals,
//!   scaled to `0..=100`.

use super::percentage;
use crate::config::{OptimizerConfig, ScoringConfig};
use crate::model::activity::{Activity, ActivityStatus};
use crate::model::project::Project;
use crate::model::user::UserId;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    TeamOverload,
    DeliveryDelay,
    BudgetOverrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.3,
            Self::Medium => 0.6,
            Self::High => 1.0,
        }
    }
}

/// One detected portfolio risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSignal {
    pub kind: RiskKind,
    pub probability: f64,
    pub impact: Impact,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskPrediction {
    /// Signals with a non-zero probability.
    pub risks: Vec<RiskSignal>,
    pub overall_score: u8,
    pub preventive_actions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskPredictor {
    optimizer: OptimizerConfig,
    scoring: ScoringConfig,
}

impl RiskPredictor {
    pub fn new(optimizer: OptimizerConfig, scoring: ScoringConfig) -> Self {
        Self { optimizer, scoring }
    }

    pub fn predict_risks(
        &self,
        projects: &[Project],
        activities: &[Activity],
        now_ms: i64,
    ) -> RiskPrediction {
        let evaluated = [
            self.overload_signal(activities),
            delay_signal(projects, activities, now_ms),
            self.budget_signal(projects),
        ];

        let total_weight: f64 = evaluated.iter().map(|signal| signal.impact.weight()).sum();
        let weighted: f64 = evaluated
            .iter()
            .map(|signal| signal.probability * signal.impact.weight())
            .sum();
        let overall_score = percentage(weighted, total_weight).min(100) as u8;

        let risks: Vec<RiskSignal> = evaluated
            .into_iter()
            .filter(|signal| signal.probability > 0.0)
            .collect();
        let preventive_actions = self.preventive_actions(&risks, overall_score);

        log::debug!(
            "event=predict_risks module=analytics status=ok projects={} activities={} signals={} overall_score={overall_score}",
            projects.len(),
            activities.len(),
            risks.len()
        );

        RiskPrediction {
            risks,
            overall_score,
            preventive_actions,
        }
    }

    fn overload_signal(&self, activities: &[Activity]) -> RiskSignal {
        let mut loads: BTreeMap<UserId, u32> = BTreeMap::new();
        for activity in activities.iter().filter(|activity| activity.is_open()) {
            if let Some(assignee) = activity.assignee_id {
                *loads.entry(assignee).or_default() += 1;
            }
        }
        let capacity = f64::from(self.optimizer.capacity.max(1));
        let overloaded = loads
            .values()
            .filter(|load| percentage(f64::from(**load), capacity) > self.optimizer.alert_utilization)
            .count();

        RiskSignal {
            kind: RiskKind::TeamOverload,
            probability: ratio(overloaded, loads.len()),
            impact: Impact::High,
            description: format!(
                "{overloaded} of {} assignees are above {}% utilization",
                loads.len(),
                self.optimizer.alert_utilization
            ),
        }
    }

    fn budget_signal(&self, projects: &[Project]) -> RiskSignal {
        let ratios: Vec<f64> = projects
            .iter()
            .filter_map(Project::budget_execution_ratio)
            .collect();
        let overrun = ratios
            .iter()
            .filter(|ratio| **ratio > self.scoring.budget_high_ratio)
            .count();

        RiskSignal {
            kind: RiskKind::BudgetOverrun,
            probability: ratio(overrun, ratios.len()),
            impact: Impact::High,
            description: format!(
                "{overrun} of {} budgeted projects executed more than {:.0}% of budget",
                ratios.len(),
                self.scoring.budget_high_ratio * 100.0
            ),
        }
    }

    fn preventive_actions(&self, risks: &[RiskSignal], overall_score: u8) -> Vec<String> {
        let mut actions: Vec<String> = risks
            .iter()
            .map(|signal| match signal.kind {
                RiskKind::TeamOverload => {
                    "Redistribute tasks away from overloaded team members".to_string()
                }
                RiskKind::DeliveryDelay => {
                    "Review blocked activities and critical dependencies".to_string()
                }
                RiskKind::BudgetOverrun => format!(
                    "Audit spending on projects above {:.0}% budget execution",
                    self.scoring.budget_high_ratio * 100.0
                ),
            })
            .collect();
        if overall_score >= 50 {
            actions.push("Consider additional resources".to_string());
        }
        actions
    }
}

fn delay_signal(projects: &[Project], activities: &[Activity], now_ms: i64) -> RiskSignal {
    let open_activities: Vec<&Activity> = activities
        .iter()
        .filter(|activity| activity.is_open())
        .collect();
    let delayed_activities = open_activities
        .iter()
        .filter(|activity| {
            activity.status == ActivityStatus::Blocked
                || activity.end_date.is_some_and(|end| end < now_ms)
        })
        .count();

    let open_projects: Vec<&Project> = projects
        .iter()
        .filter(|project| project.status.is_open())
        .collect();
    let overdue_projects = open_projects
        .iter()
        .filter(|project| project.end_date.is_some_and(|end| end < now_ms))
        .count();

    RiskSignal {
        kind: RiskKind::DeliveryDelay,
        probability: ratio(
            delayed_activities + overdue_projects,
            open_activities.len() + open_projects.len(),
        ),
        impact: Impact::Medium,
        description: format!(
            "{delayed_activities} open activities are blocked or overdue and {overdue_projects} open projects are past their end date"
        ),
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
