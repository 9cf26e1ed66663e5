//! Risk level classification.

use crate::config::ScoringConfig;
use crate::model::project::{Project, RiskLevel};

/// Risk band of a viability score.
pub fn score_band(score: u8, config: &ScoringConfig) -> RiskLevel {
    if score >= config.low_risk_min_score {
        RiskLevel::Low
    } else if score >= config.medium_risk_min_score {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Risk implied by budget execution and schedule consumption alone.
///
/// Schedule only counts while the project is still open.
pub fn ratio_risk(project: &Project, now_ms: i64, config: &ScoringConfig) -> RiskLevel {
    let execution = project.budget_execution_ratio().unwrap_or(0.0);
    let elapsed = if project.status.is_open() {
        project.elapsed_ratio(now_ms).unwrap_or(0.0)
    } else {
        0.0
    };

    if execution > config.budget_high_ratio || elapsed > config.elapsed_high_ratio {
        RiskLevel::High
    } else if execution > config.budget_medium_ratio || elapsed > config.elapsed_medium_ratio {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Worse of the score band and the ratio risk.
pub fn assess_risk(project: &Project, score: u8, now_ms: i64, config: &ScoringConfig) -> RiskLevel {
    score_band(score, config).max(ratio_risk(project, now_ms, config))
}

/// Risk derived from the project's current fields.
///
/// The stored `risk_level` is ignored: budgets and dates may have changed
/// since the last assessment. Unscored projects fall back to ratio risk.
pub fn current_risk(project: &Project, now_ms: i64, config: &ScoringConfig) -> RiskLevel {
    match project.viability_score {
        Some(score) => assess_risk(project, score, now_ms, config),
        None => ratio_risk(project, now_ms, config),
    }
}
