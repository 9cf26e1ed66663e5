//! Portfolio use-case service.
//!
//! # Responsibility
//! - Load storage snapshots and run analytics over them.
//! - Record viability assessments back on projects.
//!
//! # Invariants
//! - Analytics see a point-in-time snapshot; only `assess_project` and
//!   `register_user` write.
//! - Service APIs never bypass repository validation.

use crate::analytics::{
    assess_risk, compute_metrics, AnalysisError, FactorEvaluator, HeuristicEvaluator,
    PortfolioMetrics, ResourceOptimizer, ResourcePlan, RiskPrediction, RiskPredictor,
    ScoreResult, ScoringEngine,
};
use crate::config::AppConfig;
use crate::model::activity::Activity;
use crate::model::project::{Project, ProjectId, RiskLevel};
use crate::model::user::{User, UserId, UserRole};
use crate::model::ValidationError;
use crate::repo::{ActivityListQuery, PortfolioStore, RepoError};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    ProjectNotFound(ProjectId),
    Repo(RepoError),
    Analysis(AnalysisError),
    Validation(ValidationError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Analysis(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ProjectNotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Analysis(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AnalysisError> for ServiceError {
    fn from(value: AnalysisError) -> Self {
        Self::Analysis(value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Recorded viability assessment of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAssessment {
    pub project_id: ProjectId,
    pub score: ScoreResult,
    pub risk_level: RiskLevel,
}

/// Use-case facade over storage and analytics.
pub struct PortfolioService<R: PortfolioStore, E: FactorEvaluator = HeuristicEvaluator> {
    store: R,
    scoring: ScoringEngine<E>,
    optimizer: ResourceOptimizer,
    predictor: RiskPredictor,
}

impl<R: PortfolioStore> PortfolioService<R> {
    pub fn new(store: R, config: &AppConfig) -> Self {
        Self::with_engine(store, ScoringEngine::new(config.scoring.clone()), config)
    }
}

impl<R: PortfolioStore, E: FactorEvaluator> PortfolioService<R, E> {
    pub fn with_engine(store: R, scoring: ScoringEngine<E>, config: &AppConfig) -> Self {
        Self {
            store,
            scoring,
            optimizer: ResourceOptimizer::new(config.optimizer.clone()),
            predictor: RiskPredictor::new(config.optimizer.clone(), config.scoring.clone()),
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Adds a team member so sync can resolve them by email.
    pub fn register_user(
        &self,
        name: &str,
        email: &str,
        role: UserRole,
        now_ms: i64,
    ) -> ServiceResult<UserId> {
        let user = User::new(name.trim(), email, role, now_ms);
        Ok(self.store.create_user(&user)?)
    }

    /// Scores a project and records score, risk level and recommendations.
    ///
    /// The project is only rewritten when the assessment changed.
    pub fn assess_project(&self, id: ProjectId, now_ms: i64) -> ServiceResult<ProjectAssessment> {
        let mut project = self.load_project(id)?;
        let score = self.scoring.score_viability(&project)?;
        let risk_level = assess_risk(
            &project,
            score.viability_score,
            now_ms,
            self.scoring.config(),
        );

        let before = project.clone();
        project.viability_score = Some(score.viability_score);
        project.risk_level = Some(risk_level);
        project.recommendations.clone_from(&score.recommendations);
        if project != before {
            project.touch(now_ms);
            self.store.update_project(&project)?;
        }

        info!(
            "event=assess_project module=service status=ok project_id={id} score={} risk={}",
            score.viability_score,
            risk_level.as_str()
        );
        Ok(ProjectAssessment {
            project_id: id,
            score,
            risk_level,
        })
    }

    /// Workload plan for a project's team.
    ///
    /// Load counts open activities across the whole portfolio. Without a
    /// recorded team, the project's assignees are used.
    pub fn optimize_project(&self, id: ProjectId) -> ServiceResult<ResourcePlan> {
        let project = self.load_project(id)?;
        let open_activities: Vec<Activity> = self
            .store
            .list_activities(&ActivityListQuery::default())?
            .into_iter()
            .filter(Activity::is_open)
            .collect();

        let mut member_ids: Vec<UserId> = project.team_ids.iter().copied().collect();
        if member_ids.is_empty() {
            for activity in open_activities
                .iter()
                .filter(|activity| activity.project_id == id)
            {
                if let Some(assignee) = activity.assignee_id {
                    if !member_ids.contains(&assignee) {
                        member_ids.push(assignee);
                    }
                }
            }
        }

        let mut team = Vec::with_capacity(member_ids.len());
        for member_id in member_ids {
            if let Some(user) = self.store.get_user(member_id)? {
                team.push(user);
            }
        }

        Ok(self.optimizer.optimize(&project, &open_activities, &team)?)
    }

    pub fn predict_risks(&self, now_ms: i64) -> ServiceResult<RiskPrediction> {
        let projects = self.store.list_projects()?;
        let activities = self
            .store
            .list_activities(&ActivityListQuery::default())?;
        Ok(self.predictor.predict_risks(&projects, &activities, now_ms))
    }

    pub fn metrics(&self, now_ms: i64) -> ServiceResult<PortfolioMetrics> {
        Ok(compute_metrics(
            &self.store.list_projects()?,
            now_ms,
            self.scoring.config(),
        ))
    }

    fn load_project(&self, id: ProjectId) -> ServiceResult<Project> {
        self.store
            .get_project(id)?
            .ok_or(ServiceError::ProjectNotFound(id))
    }
}
