//! Activity repository contract and SQLite implementation.

use super::{
    map_unique_violation, parse_optional_uuid_column, parse_uuid_column, RepoError, RepoResult,
    SqliteStore,
};
use crate::model::activity::{Activity, ActivityId, ActivityStatus};
use crate::model::project::ProjectId;
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

const ACTIVITY_SELECT_SQL: &str = "SELECT
    uuid,
    project_id,
    name,
    description,
    status,
    estimated_hours,
    actual_hours,
    start_date,
    end_date,
    assignee_id,
    external_id,
    created_at,
    updated_at
FROM activities";

/// Filters for listing activities. Empty query lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityListQuery {
    pub project_id: Option<ProjectId>,
    pub assignee_id: Option<UserId>,
}

impl ActivityListQuery {
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Self::default()
        }
    }
}

/// Repository interface for activity CRUD and merge lookups.
pub trait ActivityRepository {
    /// Inserts an activity; its parent project must already exist.
    fn create_activity(&self, activity: &Activity) -> RepoResult<ActivityId>;
    fn update_activity(&self, activity: &Activity) -> RepoResult<()>;
    fn get_activity(&self, id: ActivityId) -> RepoResult<Option<Activity>>;
    fn get_activity_by_external_id(&self, external_id: &str) -> RepoResult<Option<Activity>>;
    /// Lists activities ordered by `created_at ASC, uuid ASC`.
    fn list_activities(&self, query: &ActivityListQuery) -> RepoResult<Vec<Activity>>;
    fn delete_activity(&self, id: ActivityId) -> RepoResult<()>;
}

impl ActivityRepository for SqliteStore<'_> {
    fn create_activity(&self, activity: &Activity) -> RepoResult<ActivityId> {
        activity.validate()?;

        self.conn()
            .execute(
                "INSERT INTO activities (
                    uuid, project_id, name, description, status,
                    estimated_hours, actual_hours, start_date, end_date,
                    assignee_id, external_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
                params![
                    activity.id.to_string(),
                    activity.project_id.to_string(),
                    activity.name.as_str(),
                    activity.description.as_str(),
                    activity.status.as_str(),
                    activity.estimated_hours,
                    activity.actual_hours,
                    activity.start_date,
                    activity.end_date,
                    activity.assignee_id.map(|id| id.to_string()),
                    activity.external_id.as_deref(),
                    activity.created_at,
                    activity.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "activity", || duplicate_key(activity)))?;

        Ok(activity.id)
    }

    fn update_activity(&self, activity: &Activity) -> RepoResult<()> {
        activity.validate()?;

        let changed = self
            .conn()
            .execute(
                "UPDATE activities
                 SET
                    project_id = ?2,
                    name = ?3,
                    description = ?4,
                    status = ?5,
                    estimated_hours = ?6,
                    actual_hours = ?7,
                    start_date = ?8,
                    end_date = ?9,
                    assignee_id = ?10,
                    external_id = ?11,
                    updated_at = ?12
                 WHERE uuid = ?1;",
                params![
                    activity.id.to_string(),
                    activity.project_id.to_string(),
                    activity.name.as_str(),
                    activity.description.as_str(),
                    activity.status.as_str(),
                    activity.estimated_hours,
                    activity.actual_hours,
                    activity.start_date,
                    activity.end_date,
                    activity.assignee_id.map(|id| id.to_string()),
                    activity.external_id.as_deref(),
                    activity.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "activity", || duplicate_key(activity)))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "activity",
                id: activity.id,
            });
        }
        Ok(())
    }

    fn get_activity(&self, id: ActivityId) -> RepoResult<Option<Activity>> {
        self.conn()
            .query_row(
                &format!("{ACTIVITY_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_activity_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn get_activity_by_external_id(&self, external_id: &str) -> RepoResult<Option<Activity>> {
        self.conn()
            .query_row(
                &format!("{ACTIVITY_SELECT_SQL} WHERE external_id = ?1;"),
                [external_id],
                |row| Ok(parse_activity_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_activities(&self, query: &ActivityListQuery) -> RepoResult<Vec<Activity>> {
        let mut sql = format!("{ACTIVITY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(project_id) = query.project_id {
            sql.push_str(" AND project_id = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }
        if let Some(assignee_id) = query.assignee_id {
            sql.push_str(" AND assignee_id = ?");
            bind_values.push(Value::Text(assignee_id.to_string()));
        }
        sql.push_str(" ORDER BY created_at ASC, uuid ASC;");

        let mut stmt = self.conn().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut activities = Vec::new();
        while let Some(row) = rows.next()? {
            activities.push(parse_activity_row(row)?);
        }
        Ok(activities)
    }

    fn delete_activity(&self, id: ActivityId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM activities WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "activity",
                id,
            });
        }
        Ok(())
    }
}

fn duplicate_key(activity: &Activity) -> String {
    activity
        .external_id
        .clone()
        .unwrap_or_else(|| activity.id.to_string())
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<Activity> {
    let uuid_text: String = row.get("uuid")?;
    let project_text: String = row.get("project_id")?;
    let status_text: String = row.get("status")?;
    let status = ActivityStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid activity status `{status_text}`"))
    })?;

    let activity = Activity {
        id: parse_uuid_column("activities.uuid", &uuid_text)?,
        project_id: parse_uuid_column("activities.project_id", &project_text)?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        estimated_hours: row.get("estimated_hours")?,
        actual_hours: row.get("actual_hours")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        assignee_id: parse_optional_uuid_column("activities.assignee_id", row.get("assignee_id")?)?,
        external_id: row.get("external_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    activity.validate()?;
    Ok(activity)
}
