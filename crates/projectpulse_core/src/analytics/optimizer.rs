//! Team workload balancing.
//!
//! # Responsibility
//! - Measure each member's load against capacity.
//! - Flag overloaded members and suggest one redistribution.
//!
//! # Invariants
//! - Load counts every provided activity assigned to the member, whatever
//!   its project.
//! - Suggestions come from a greedy single pass and carry no optimality
//!   guarantee.

use super::percentage;
use crate::config::OptimizerConfig;
use crate::model::activity::Activity;
use crate::model::project::{Project, ProjectId};
use crate::model::user::{User, UserId};
use crate::model::ValidationError;
use serde::Serialize;

/// Coarse load classification of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTier {
    Overloaded,
    High,
    Normal,
    Available,
}

impl LoadTier {
    pub fn from_utilization(utilization: u32) -> Self {
        match utilization {
            u if u > 90 => Self::Overloaded,
            u if u > 70 => Self::High,
            u if u > 50 => Self::Normal,
            _ => Self::Available,
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            Self::Overloaded => "Overloaded, redistribute tasks",
            Self::High => "High load, monitor closely",
            Self::Normal => "Normal load, optimal",
            Self::Available => "Capacity available, can take more tasks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberAllocation {
    pub user_id: UserId,
    pub name: String,
    pub load: u32,
    pub capacity: u32,
    /// `round(100 * load / capacity)`; may exceed 100.
    pub utilization: u32,
    pub tier: LoadTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizationSuggestion {
    /// Move work from the most loaded alerted member to the least loaded
    /// available one.
    Redistribute {
        from: UserId,
        from_name: String,
        to: UserId,
        to_name: String,
    },
    /// Too many members are overloaded for redistribution to help.
    Structural { overloaded_members: usize },
}

impl OptimizationSuggestion {
    pub fn message(&self) -> String {
        match self {
            Self::Redistribute {
                from_name, to_name, ..
            } => format!("Redistribute tasks from {from_name} to {to_name}"),
            Self::Structural { .. } => {
                "Consider temporary hires or deferring non-critical projects".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePlan {
    pub project_id: ProjectId,
    pub allocations: Vec<MemberAllocation>,
    pub alerts: Vec<MemberAllocation>,
    pub suggestions: Vec<OptimizationSuggestion>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOptimizer {
    config: OptimizerConfig,
}

impl ResourceOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Builds the workload plan for `team` over `activities`.
    ///
    /// # Errors
    /// - Invalid `project`.
    /// - Zero capacity.
    pub fn optimize(
        &self,
        project: &Project,
        activities: &[Activity],
        team: &[User],
    ) -> Result<ResourcePlan, ValidationError> {
        project.validate()?;
        let capacity = self.config.capacity;
        if capacity == 0 {
            return Err(ValidationError::InvalidSetting {
                name: "optimizer capacity",
                message: "must be greater than zero".to_string(),
            });
        }

        let allocations: Vec<MemberAllocation> = team
            .iter()
            .map(|member| {
                let load = activities
                    .iter()
                    .filter(|activity| activity.assignee_id == Some(member.id))
                    .count() as u32;
                let utilization = percentage(f64::from(load), f64::from(capacity));
                MemberAllocation {
                    user_id: member.id,
                    name: member.name.clone(),
                    load,
                    capacity,
                    utilization,
                    tier: LoadTier::from_utilization(utilization),
                }
            })
            .collect();

        let alerts: Vec<MemberAllocation> = allocations
            .iter()
            .filter(|allocation| allocation.utilization > self.config.alert_utilization)
            .cloned()
            .collect();
        let suggestions = self.suggestions(&allocations, &alerts);

        log::debug!(
            "event=optimize_project module=analytics status=ok project_id={} members={} alerts={} suggestions={}",
            project.id,
            allocations.len(),
            alerts.len(),
            suggestions.len()
        );

        Ok(ResourcePlan {
            project_id: project.id,
            allocations,
            alerts,
            suggestions,
        })
    }

    fn suggestions(
        &self,
        allocations: &[MemberAllocation],
        overloaded: &[MemberAllocation],
    ) -> Vec<OptimizationSuggestion> {
        let mut suggestions = Vec::new();

        // First member wins ties on both sides.
        let busiest = overloaded
            .iter()
            .reduce(|best, next| if next.load > best.load { next } else { best });
        let idlest = allocations
            .iter()
            .filter(|allocation| allocation.utilization < self.config.available_utilization)
            .reduce(|best, next| if next.load < best.load { next } else { best });

        if let (Some(from), Some(to)) = (busiest, idlest) {
            suggestions.push(OptimizationSuggestion::Redistribute {
                from: from.user_id,
                from_name: from.name.clone(),
                to: to.user_id,
                to_name: to.name.clone(),
            });
        }
        if overloaded.len() > self.config.structural_overload_count {
            suggestions.push(OptimizationSuggestion::Structural {
                overloaded_members: overloaded.len(),
            });
        }
        suggestions
    }
}
