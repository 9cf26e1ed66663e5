//! Portfolio analytics: viability scoring, workload balancing, risk
//! prediction and dashboard metrics.
//!
//! # Responsibility
//! - Derive read-only analytics from point-in-time entity snapshots.
//!
//! # Invariants
//! - Analytics never mutate their inputs or touch storage.
//! - Scores are integers within `0..=100`.

use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod evaluator;
pub mod metrics;
pub mod optimizer;
pub mod predictor;
pub mod risk;
pub mod scoring;

pub use evaluator::{FactorEvaluator, HeuristicEvaluator};
pub use metrics::{compute_metrics, CardTone, MetricCard, PortfolioMetrics};
pub use optimizer::{
    LoadTier, MemberAllocation, OptimizationSuggestion, ResourceOptimizer, ResourcePlan,
};
pub use predictor::{Impact, RiskKind, RiskPrediction, RiskPredictor, RiskSignal};
pub use risk::{assess_risk, current_risk, ratio_risk, score_band};
pub use scoring::{Factor, ScoreResult, ScoringEngine};

/// Scoring could not run on the given input.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    InvalidProject(ValidationError),
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProject(err) => write!(f, "cannot analyze project: {err}"),
        }
    }
}

impl Error for AnalysisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidProject(err) => Some(err),
        }
    }
}

impl From<ValidationError> for AnalysisError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidProject(value)
    }
}

/// `round(100 * part / whole)`, or 0 when `whole` is 0.
pub(crate) fn percentage(part: f64, whole: f64) -> u32 {
    if whole <= 0.0 {
        return 0;
    }
    let value = (100.0 * part / whole).round();
    if value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::percentage;

    #[test]
    fn percentage_rounds_half_up_and_guards_zero() {
        assert_eq!(percentage(6.0, 5.0), 120);
        assert_eq!(percentage(1.0, 3.0), 33);
        assert_eq!(percentage(2.5, 100.0), 3);
        assert_eq!(percentage(4.0, 0.0), 0);
    }
}
