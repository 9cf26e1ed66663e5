//! Viability scoring engine.
//!
//! # Responsibility
//! - Combine the three factor scores into one viability score.
//! - Attach band-keyed descriptions, recommendations, risks and next steps.
//!
//! # Invariants
//! - `viability_score == round(mean(factor scores))`.
//! - Invalid projects are rejected before any factor is evaluated.

use super::evaluator::{FactorEvaluator, HeuristicEvaluator};
use super::risk::score_band;
use super::AnalysisError;
use crate::config::ScoringConfig;
use crate::model::project::{Project, RiskLevel};
use serde::Serialize;

const NEXT_STEPS: [&str; 4] = [
    "Validate requirements with stakeholders",
    "Define specific milestones and deliverables",
    "Assign owners per area",
    "Schedule weekly follow-up meetings",
];

/// One scored viability factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Factor {
    pub name: String,
    pub score: u8,
    pub description: String,
}

/// Viability assessment of one project. Not persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub viability_score: u8,
    pub confidence: f64,
    pub factors: Vec<Factor>,
    pub recommendations: Vec<String>,
    pub risks: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum FactorKind {
    TechnicalComplexity,
    ResourceAvailability,
    TimeEstimate,
}

impl FactorKind {
    const ALL: [Self; 3] = [
        Self::TechnicalComplexity,
        Self::ResourceAvailability,
        Self::TimeEstimate,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::TechnicalComplexity => "Technical complexity",
            Self::ResourceAvailability => "Resource availability",
            Self::TimeEstimate => "Time estimate",
        }
    }

    fn description(self, band: RiskLevel) -> &'static str {
        match (self, band) {
            (Self::TechnicalComplexity, RiskLevel::Low) => "Low complexity, manageable project",
            (Self::TechnicalComplexity, RiskLevel::Medium) => {
                "Medium complexity, requires planning"
            }
            (Self::TechnicalComplexity, RiskLevel::High) => {
                "High complexity, requires specialized expertise"
            }
            (Self::ResourceAvailability, RiskLevel::Low) => "Sufficient resources available",
            (Self::ResourceAvailability, RiskLevel::Medium) => {
                "Limited resources, optimization needed"
            }
            (Self::ResourceAvailability, RiskLevel::High) => {
                "Insufficient resources, scaling required"
            }
            (Self::TimeEstimate, RiskLevel::Low) => "Realistic, well-estimated timeline",
            (Self::TimeEstimate, RiskLevel::Medium) => "Tight timeline, variations likely",
            (Self::TimeEstimate, RiskLevel::High) => "Insufficient time, review scope",
        }
    }
}

/// Scores project viability with a pluggable factor evaluator.
#[derive(Debug, Clone)]
pub struct ScoringEngine<E = HeuristicEvaluator> {
    evaluator: E,
    config: ScoringConfig,
}

impl ScoringEngine<HeuristicEvaluator> {
    pub fn new(config: ScoringConfig) -> Self {
        Self::with_evaluator(HeuristicEvaluator, config)
    }
}

impl Default for ScoringEngine<HeuristicEvaluator> {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl<E: FactorEvaluator> ScoringEngine<E> {
    pub fn with_evaluator(evaluator: E, config: ScoringConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores a project.
    ///
    /// # Errors
    /// - `InvalidProject` when the project fails validation.
    pub fn score_viability(&self, project: &Project) -> Result<ScoreResult, AnalysisError> {
        project.validate()?;

        let factors: Vec<Factor> = FactorKind::ALL
            .into_iter()
            .map(|kind| {
                let score = self.evaluate(kind, project).min(100);
                Factor {
                    name: kind.name().to_string(),
                    score,
                    description: kind
                        .description(score_band(score, &self.config))
                        .to_string(),
                }
            })
            .collect();

        let total: u32 = factors.iter().map(|factor| u32::from(factor.score)).sum();
        let viability_score = (f64::from(total) / factors.len() as f64).round() as u8;

        log::debug!(
            "event=score_project module=analytics status=ok project_id={} score={viability_score}",
            project.id
        );

        Ok(ScoreResult {
            viability_score,
            confidence: self.config.confidence,
            factors,
            recommendations: self.recommendations(viability_score),
            risks: self.risks(viability_score),
            next_steps: NEXT_STEPS.iter().map(|step| (*step).to_string()).collect(),
        })
    }

    fn evaluate(&self, kind: FactorKind, project: &Project) -> u8 {
        match kind {
            FactorKind::TechnicalComplexity => self.evaluator.technical_complexity(project),
            FactorKind::ResourceAvailability => self.evaluator.resource_availability(project),
            FactorKind::TimeEstimate => self.evaluator.time_estimate(project),
        }
    }

    fn recommendations(&self, score: u8) -> Vec<String> {
        let messages: [&str; 2] = match score_band(score, &self.config) {
            RiskLevel::Low => [
                "High probability of success",
                "Proceed with implementation as planned",
            ],
            RiskLevel::Medium => ["Viable with minor adjustments", "Review resource allocation"],
            RiskLevel::High => [
                "Project needs significant rethinking",
                "Consider splitting into smaller phases",
            ],
        };
        messages.iter().map(|message| (*message).to_string()).collect()
    }

    fn risks(&self, score: u8) -> Vec<String> {
        let mut risks = Vec::new();
        if score < self.config.general_risk_below {
            risks.push("High risk of delivery delays".to_string());
            risks.push("Additional resources may be needed".to_string());
        }
        if score < self.config.critical_risk_below {
            risks.push("Critical risk of project failure".to_string());
        }
        risks
    }
}

#[cfg(test)]
mod tests {
    use super::ScoringEngine;
    use crate::analytics::evaluator::FactorEvaluator;
    use crate::analytics::AnalysisError;
    use crate::config::ScoringConfig;
    use crate::model::project::Project;

    struct Fixed(u8, u8, u8);

    impl FactorEvaluator for Fixed {
        fn technical_complexity(&self, _project: &Project) -> u8 {
            self.0
        }
        fn resource_availability(&self, _project: &Project) -> u8 {
            self.1
        }
        fn time_estimate(&self, _project: &Project) -> u8 {
            self.2
        }
    }

    fn engine(a: u8, b: u8, c: u8) -> ScoringEngine<Fixed> {
        ScoringEngine::with_evaluator(Fixed(a, b, c), ScoringConfig::default())
    }

    #[test]
    fn score_is_rounded_factor_mean() {
        let project = Project::new("LMS", 0);
        let result = engine(70, 71, 71).score_viability(&project).unwrap();
        assert_eq!(result.viability_score, 71);
        assert_eq!(result.factors.len(), 3);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.next_steps.len(), 4);
    }

    #[test]
    fn high_band_lists_every_risk() {
        let result = engine(40, 40, 40)
            .score_viability(&Project::new("LMS", 0))
            .unwrap();
        assert_eq!(result.viability_score, 40);
        assert_eq!(result.risks.len(), 3);
        assert_eq!(result.recommendations[0], "Project needs significant rethinking");
        assert_eq!(result.factors[0].description, "High complexity, requires specialized expertise");
    }

    #[test]
    fn medium_band_below_seventy_lists_general_risks() {
        let result = engine(65, 65, 65)
            .score_viability(&Project::new("LMS", 0))
            .unwrap();
        assert_eq!(result.risks.len(), 2);
        assert_eq!(result.recommendations[0], "Viable with minor adjustments");
    }

    #[test]
    fn low_band_has_no_risks() {
        let result = engine(90, 85, 85)
            .score_viability(&Project::new("LMS", 0))
            .unwrap();
        assert_eq!(result.viability_score, 87);
        assert!(result.risks.is_empty());
        assert_eq!(result.factors[1].description, "Sufficient resources available");
    }

    #[test]
    fn out_of_range_factors_are_capped() {
        let result = engine(250, 100, 100)
            .score_viability(&Project::new("LMS", 0))
            .unwrap();
        assert_eq!(result.factors[0].score, 100);
        assert_eq!(result.viability_score, 100);
    }

    #[test]
    fn malformed_project_is_rejected() {
        let err = ScoringEngine::default()
            .score_viability(&Project::new("  ", 0))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidProject(_)));
    }

    #[test]
    fn heuristic_score_stays_in_range() {
        let mut project = Project::new("Proyecto simple", 0);
        project.description = "Un portal simple".to_string();
        let result = ScoringEngine::default().score_viability(&project).unwrap();
        // (90 + 60 + 75) / 3 = 75
        assert_eq!(result.viability_score, 75);
        assert!(result.viability_score <= 100);
    }
}
