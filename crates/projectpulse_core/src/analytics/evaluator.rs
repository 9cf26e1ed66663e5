//! Viability factor evaluation.

use crate::model::project::Project;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Scores the three viability factors of a project, each within `0..=100`.
///
/// Implementations must be deterministic for a given project so that
/// repeated assessments agree.
pub trait FactorEvaluator {
    fn technical_complexity(&self, project: &Project) -> u8;
    fn resource_availability(&self, project: &Project) -> u8;
    fn time_estimate(&self, project: &Project) -> u8;
}

/// Rule-based evaluator over description keywords, team size, budget
/// headroom and planned duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl FactorEvaluator for HeuristicEvaluator {
    fn technical_complexity(&self, project: &Project) -> u8 {
        let description = project.description.to_lowercase();
        if description.contains("complejo") || description.contains("complex") {
            50
        } else if description.contains("simple") {
            90
        } else {
            70
        }
    }

    fn resource_availability(&self, project: &Project) -> u8 {
        let team_size = project.team_ids.len().min(6) as i32;
        let mut score = if team_size == 0 { 60 } else { 70 + 5 * team_size };
        if project
            .budget_execution_ratio()
            .is_some_and(|ratio| ratio > 0.9)
        {
            score -= 15;
        }
        score.clamp(0, 100) as u8
    }

    fn time_estimate(&self, project: &Project) -> u8 {
        let (Some(start), Some(end)) = (project.start_date, project.end_date) else {
            return 75;
        };
        let weeks = (end - start) / WEEK_MS;
        match weeks {
            w if w < 2 => 60,
            2..=26 => 85,
            w if w > 52 => 65,
            _ => 75,
        }
    }
}
