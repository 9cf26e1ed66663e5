//! Core analytics and reconciliation engine for ProjectPulse.
//! This crate is the single source of truth for portfolio invariants.

pub mod analytics;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use analytics::{
    assess_risk, compute_metrics, AnalysisError, FactorEvaluator, HeuristicEvaluator,
    PortfolioMetrics, ResourceOptimizer, ResourcePlan, RiskPrediction, RiskPredictor,
    ScoreResult, ScoringEngine,
};
pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::activity::{Activity, ActivityId, ActivityStatus};
pub use model::project::{Project, ProjectId, ProjectPriority, ProjectStatus, RiskLevel};
pub use model::user::{User, UserId, UserRole};
pub use model::{now_epoch_ms, ValidationError};
pub use repo::{PortfolioStore, RepoError, RepoResult, SqliteStore};
pub use service::{PortfolioService, ProjectAssessment, ServiceError};
pub use sync::{
    ExternalSource, JsonExportSource, SyncError, SyncReconciler, SyncReport, SyncState,
    SyncStateHandle,
};
