//! Field-level merge of mapped partials into local storage.
//!
//! # Responsibility
//! - Insert or update local entities keyed by external id.
//! - Resolve external people references to local users by email.
//!
//! # Invariants
//! - Fields absent from a partial never overwrite local values.
//! - An update that changes nothing performs no write, so `updated_at` stays put.
//! - An activity is only written under an existing local project; otherwise
//!   it is returned as orphaned.

use super::mapping::{PartialActivity, PartialProject, UNNAMED_ACTIVITY, UNNAMED_PROJECT};
use crate::model::activity::{Activity, ActivityId, DEFAULT_ESTIMATED_HOURS};
use crate::model::project::{Project, ProjectId};
use crate::model::user::UserId;
use crate::model::ValidationError;
use crate::repo::{PortfolioStore, RepoError, RepoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Per-record merge failure.
#[derive(Debug)]
pub enum MergeError {
    /// The merged entity breaks a model invariant.
    Validation(ValidationError),
    Repo(RepoError),
    /// Local and external edits disagree on a field. Not produced yet:
    /// merges are currently last-write-wins per field.
    Conflict {
        entity: &'static str,
        external_id: String,
        field: &'static str,
    },
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "merged record is invalid: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Conflict {
                entity,
                external_id,
                field,
            } => write!(
                f,
                "conflicting edits on {entity} `{external_id}` field `{field}`"
            ),
        }
    }
}

impl Error for MergeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Conflict { .. } => None,
        }
    }
}

impl From<RepoError> for MergeError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for MergeError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// What a successful merge did to local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted(Uuid),
    Updated(Uuid),
    Unchanged(Uuid),
}

impl MergeOutcome {
    pub fn id(self) -> Uuid {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Unchanged(id) => id,
        }
    }
}

/// Activity held back because its parent project is not stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedActivity {
    pub external_id: String,
    pub name: Option<String>,
    pub project_external_id: Option<String>,
    pub reason: String,
}

/// Result of merging one activity partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityMerge {
    Merged(MergeOutcome),
    Orphaned(OrphanedActivity),
}

/// Inserts or updates the project identified by `partial.external_id`.
pub fn merge_project<R: PortfolioStore + ?Sized>(
    store: &R,
    partial: &PartialProject,
    now_ms: i64,
) -> Result<MergeOutcome, MergeError> {
    let owner_id = resolve_user(store, partial.owner_email.as_deref())?;
    let team_ids = resolve_team(store, &partial.team_emails)?;

    match store.get_project_by_external_id(&partial.external_id)? {
        Some(existing) => {
            let mut merged = existing.clone();
            apply_project_fields(&mut merged, partial, owner_id, team_ids);
            if merged == existing {
                return Ok(MergeOutcome::Unchanged(existing.id));
            }
            merged.touch(now_ms);
            store.update_project(&merged)?;
            Ok(MergeOutcome::Updated(merged.id))
        }
        None => {
            let name = partial.name.as_deref().unwrap_or(UNNAMED_PROJECT);
            let mut project = Project::new(name, now_ms);
            project.external_id = Some(partial.external_id.clone());
            apply_project_fields(&mut project, partial, owner_id, team_ids);
            let id = store.create_project(&project)?;
            Ok(MergeOutcome::Inserted(id))
        }
    }
}

/// Inserts or updates the activity identified by `partial.external_id`.
///
/// A referenced parent project must exist locally. Without a reference, an
/// existing activity keeps its current project and a new one is orphaned.
pub fn merge_activity<R: PortfolioStore + ?Sized>(
    store: &R,
    partial: &PartialActivity,
    now_ms: i64,
) -> Result<ActivityMerge, MergeError> {
    let existing = store.get_activity_by_external_id(&partial.external_id)?;

    let project_id: Option<ProjectId> = match partial.project_external_id.as_deref() {
        Some(project_external_id) => store
            .get_project_by_external_id(project_external_id)?
            .map(|project| project.id),
        None => existing.as_ref().map(|activity| activity.project_id),
    };
    let Some(project_id) = project_id else {
        return Ok(ActivityMerge::Orphaned(orphan(partial)));
    };

    let assignee_id = resolve_user(store, partial.assignee_email.as_deref())?;

    match existing {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.project_id = project_id;
            apply_activity_fields(&mut merged, partial, assignee_id);
            if merged == existing {
                return Ok(ActivityMerge::Merged(MergeOutcome::Unchanged(existing.id)));
            }
            merged.touch(now_ms);
            store.update_activity(&merged)?;
            Ok(ActivityMerge::Merged(MergeOutcome::Updated(merged.id)))
        }
        None => {
            let mut activity = Activity::new(
                project_id,
                partial.name.as_deref().unwrap_or(UNNAMED_ACTIVITY),
                partial.estimated_hours.unwrap_or(DEFAULT_ESTIMATED_HOURS),
                now_ms,
            );
            activity.external_id = Some(partial.external_id.clone());
            apply_activity_fields(&mut activity, partial, assignee_id);
            let id: ActivityId = store.create_activity(&activity)?;
            Ok(ActivityMerge::Merged(MergeOutcome::Inserted(id)))
        }
    }
}

fn apply_project_fields(
    project: &mut Project,
    partial: &PartialProject,
    owner_id: Option<UserId>,
    team_ids: BTreeSet<UserId>,
) {
    if let Some(name) = &partial.name {
        project.name.clone_from(name);
    }
    if let Some(description) = &partial.description {
        project.description.clone_from(description);
    }
    if let Some(status) = partial.status {
        project.status = status;
    }
    if let Some(priority) = partial.priority {
        project.priority = priority;
    }
    if partial.start_date.is_some() {
        project.start_date = partial.start_date;
    }
    if partial.end_date.is_some() {
        project.end_date = partial.end_date;
    }
    if partial.budget.is_some() {
        project.budget = partial.budget;
    }
    if partial.budget_executed.is_some() {
        project.budget_executed = partial.budget_executed;
    }
    if owner_id.is_some() {
        project.owner_id = owner_id;
    }
    if !team_ids.is_empty() {
        project.team_ids = team_ids;
    }
}

fn apply_activity_fields(
    activity: &mut Activity,
    partial: &PartialActivity,
    assignee_id: Option<UserId>,
) {
    if let Some(name) = &partial.name {
        activity.name.clone_from(name);
    }
    if let Some(description) = &partial.description {
        activity.description.clone_from(description);
    }
    if let Some(status) = partial.status {
        activity.status = status;
    }
    if let Some(hours) = partial.estimated_hours {
        activity.estimated_hours = hours;
    }
    if partial.actual_hours.is_some() {
        activity.actual_hours = partial.actual_hours;
    }
    if partial.start_date.is_some() {
        activity.start_date = partial.start_date;
    }
    if partial.end_date.is_some() {
        activity.end_date = partial.end_date;
    }
    if assignee_id.is_some() {
        activity.assignee_id = assignee_id;
    }
}

fn orphan(partial: &PartialActivity) -> OrphanedActivity {
    let reason = match partial.project_external_id.as_deref() {
        Some(project_external_id) => {
            format!("parent project `{project_external_id}` is not stored locally")
        }
        None => "record does not reference a parent project".to_string(),
    };
    OrphanedActivity {
        external_id: partial.external_id.clone(),
        name: partial.name.clone(),
        project_external_id: partial.project_external_id.clone(),
        reason,
    }
}

fn resolve_user<R: PortfolioStore + ?Sized>(
    store: &R,
    email: Option<&str>,
) -> RepoResult<Option<UserId>> {
    let Some(email) = email else {
        return Ok(None);
    };
    let user = store.get_user_by_email(email)?;
    if user.is_none() {
        log::debug!("event=resolve_user module=sync status=miss email_known=false");
    }
    Ok(user.map(|user| user.id))
}

fn resolve_team<R: PortfolioStore + ?Sized>(
    store: &R,
    emails: &[String],
) -> RepoResult<BTreeSet<UserId>> {
    let mut team = BTreeSet::new();
    for email in emails {
        if let Some(id) = resolve_user(store, Some(email))? {
            team.insert(id);
        }
    }
    Ok(team)
}
