//! Engine configuration loaded from TOML.
//!
//! # Responsibility
//! - Hold tunables for sync, field mapping, scoring and optimization.
//! - Provide defaults matching the reference workspace for every section.
//!
//! # Invariants
//! - A missing config file yields `AppConfig::default()`.
//! - Loaded configs are validated before use.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub fields: FieldMapping,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_project_page_size")]
    pub project_page_size: u32,
    #[serde(default = "default_activity_page_size")]
    pub activity_page_size: u32,
    /// Upper bound on pages fetched per entity type in one run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Run timeout; `None` disables it.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            project_page_size: default_project_page_size(),
            activity_page_size: default_activity_page_size(),
            max_pages: default_max_pages(),
            interval_secs: default_interval_secs(),
            timeout_secs: None,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// External property names per local field.
///
/// Each field lists candidate names; the first one present on a record wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default)]
    pub projects: ProjectFieldNames,
    #[serde(default)]
    pub activities: ActivityFieldNames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFieldNames {
    pub name: Vec<String>,
    pub description: Vec<String>,
    pub status: Vec<String>,
    pub priority: Vec<String>,
    pub start_date: Vec<String>,
    pub end_date: Vec<String>,
    pub budget: Vec<String>,
    pub budget_executed: Vec<String>,
    pub owner: Vec<String>,
    pub team: Vec<String>,
}

impl Default for ProjectFieldNames {
    fn default() -> Self {
        Self {
            name: names(&["Nombre de Proyecto", "titulo"]),
            description: names(&["descripcion"]),
            status: names(&["Estado"]),
            priority: names(&["Prioridad"]),
            start_date: names(&["Fecha", "fecha"]),
            end_date: names(&["Fecha Fin"]),
            budget: names(&["Presupuesto"]),
            budget_executed: names(&["Presupuesto Ejecutado"]),
            owner: names(&["Responsable"]),
            team: names(&["Equipo"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityFieldNames {
    pub name: Vec<String>,
    pub description: Vec<String>,
    pub status: Vec<String>,
    pub estimated_hours: Vec<String>,
    pub actual_hours: Vec<String>,
    pub start_date: Vec<String>,
    pub end_date: Vec<String>,
    pub project: Vec<String>,
    pub assignee: Vec<String>,
}

impl Default for ActivityFieldNames {
    fn default() -> Self {
        Self {
            name: names(&["Actividad Desarrollada", "nombre"]),
            description: names(&["descripcion"]),
            status: names(&["Estado"]),
            estimated_hours: names(&["Tiempo para completar tarea"]),
            actual_hours: names(&["horasReales"]),
            start_date: names(&["Fecha de desarrollo"]),
            end_date: names(&["Fecha de término"]),
            project: names(&["Proyecto"]),
            assignee: names(&["Desarrollador de actividad"]),
        }
    }
}

/// Score bands and risk thresholds shared by scoring, optimizer and predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Scores at or above this are the low-risk band.
    pub low_risk_min_score: u8,
    /// Scores at or above this (and below `low_risk_min_score`) are medium.
    pub medium_risk_min_score: u8,
    /// Scores below this add the general risk messages.
    pub general_risk_below: u8,
    /// Scores below this add the critical-failure message.
    pub critical_risk_below: u8,
    /// Budget execution above this ratio escalates to high risk.
    pub budget_high_ratio: f64,
    /// Budget execution above this ratio escalates to medium risk.
    pub budget_medium_ratio: f64,
    /// Schedule elapsed above this ratio on an open project is high risk.
    pub elapsed_high_ratio: f64,
    /// Schedule elapsed above this ratio on an open project is medium risk.
    pub elapsed_medium_ratio: f64,
    pub confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            low_risk_min_score: 80,
            medium_risk_min_score: 60,
            general_risk_below: 70,
            critical_risk_below: 50,
            budget_high_ratio: 0.9,
            budget_medium_ratio: 0.7,
            elapsed_high_ratio: 0.9,
            elapsed_medium_ratio: 0.8,
            confidence: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Concurrent activities one member can carry.
    pub capacity: u32,
    /// Utilization percentage above which a member is alert-flagged.
    pub alert_utilization: u32,
    /// Utilization percentage below which a member can take more work.
    pub available_utilization: u32,
    /// More overloaded members than this triggers structural suggestions.
    pub structural_overload_count: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            alert_utilization: 80,
            available_utilization: 50,
            structural_overload_count: 2,
        }
    }
}

/// Configuration loading and validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

impl AppConfig {
    /// Loads and validates a config file, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sync = &self.sync;
        if sync.project_page_size == 0 || sync.activity_page_size == 0 {
            return Err(ConfigError::Invalid(
                "sync page sizes must be greater than zero".to_string(),
            ));
        }
        if sync.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_pages must be greater than zero".to_string(),
            ));
        }
        if sync.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_secs must be greater than zero".to_string(),
            ));
        }

        let scoring = &self.scoring;
        if scoring.low_risk_min_score > 100
            || scoring.medium_risk_min_score > scoring.low_risk_min_score
        {
            return Err(ConfigError::Invalid(format!(
                "scoring bands must satisfy medium ({}) <= low ({}) <= 100",
                scoring.medium_risk_min_score, scoring.low_risk_min_score
            )));
        }
        if scoring.critical_risk_below > scoring.general_risk_below {
            return Err(ConfigError::Invalid(format!(
                "scoring.critical_risk_below ({}) must not exceed general_risk_below ({})",
                scoring.critical_risk_below, scoring.general_risk_below
            )));
        }
        if scoring.budget_medium_ratio > scoring.budget_high_ratio
            || scoring.elapsed_medium_ratio > scoring.elapsed_high_ratio
        {
            return Err(ConfigError::Invalid(
                "scoring medium ratios must not exceed high ratios".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&scoring.confidence) {
            return Err(ConfigError::Invalid(format!(
                "scoring.confidence must be within 0..=1, got {}",
                scoring.confidence
            )));
        }

        if self.optimizer.capacity == 0 {
            return Err(ConfigError::Invalid(
                "optimizer.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn default_project_page_size() -> u32 {
    50
}

fn default_activity_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    100
}

fn default_interval_secs() -> u64 {
    15 * 60
}
