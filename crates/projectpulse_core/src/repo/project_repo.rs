//! Project repository contract and SQLite implementation.

use super::{
    from_json_column, map_unique_violation, parse_optional_uuid_column, parse_uuid_column,
    to_json_column, RepoError, RepoResult, SqliteStore,
};
use crate::model::project::{Project, ProjectId, ProjectPriority, ProjectStatus, RiskLevel};
use rusqlite::{params, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    status,
    priority,
    start_date,
    end_date,
    budget,
    budget_executed,
    owner_id,
    team_ids,
    external_id,
    viability_score,
    risk_level,
    recommendations,
    created_at,
    updated_at
FROM projects";

/// Repository interface for project CRUD and merge lookups.
pub trait ProjectRepository {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId>;
    /// Replaces every stored field of an existing project.
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn get_project_by_external_id(&self, external_id: &str) -> RepoResult<Option<Project>>;
    /// Lists all projects ordered by `created_at ASC, uuid ASC`.
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    /// Deletes a project and, through cascade, its activities.
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

impl ProjectRepository for SqliteStore<'_> {
    fn create_project(&self, project: &Project) -> RepoResult<ProjectId> {
        project.validate()?;

        self.conn()
            .execute(
                "INSERT INTO projects (
                    uuid, name, description, status, priority,
                    start_date, end_date, budget, budget_executed,
                    owner_id, team_ids, external_id,
                    viability_score, risk_level, recommendations,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
                params![
                    project.id.to_string(),
                    project.name.as_str(),
                    project.description.as_str(),
                    project.status.as_str(),
                    project.priority.as_str(),
                    project.start_date,
                    project.end_date,
                    project.budget,
                    project.budget_executed,
                    project.owner_id.map(|id| id.to_string()),
                    to_json_column(&project.team_ids)?,
                    project.external_id.as_deref(),
                    project.viability_score,
                    project.risk_level.map(RiskLevel::as_str),
                    to_json_column(&project.recommendations)?,
                    project.created_at,
                    project.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "project", || duplicate_key(project)))?;

        Ok(project.id)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;

        let changed = self
            .conn()
            .execute(
                "UPDATE projects
                 SET
                    name = ?2,
                    description = ?3,
                    status = ?4,
                    priority = ?5,
                    start_date = ?6,
                    end_date = ?7,
                    budget = ?8,
                    budget_executed = ?9,
                    owner_id = ?10,
                    team_ids = ?11,
                    external_id = ?12,
                    viability_score = ?13,
                    risk_level = ?14,
                    recommendations = ?15,
                    updated_at = ?16
                 WHERE uuid = ?1;",
                params![
                    project.id.to_string(),
                    project.name.as_str(),
                    project.description.as_str(),
                    project.status.as_str(),
                    project.priority.as_str(),
                    project.start_date,
                    project.end_date,
                    project.budget,
                    project.budget_executed,
                    project.owner_id.map(|id| id.to_string()),
                    to_json_column(&project.team_ids)?,
                    project.external_id.as_deref(),
                    project.viability_score,
                    project.risk_level.map(RiskLevel::as_str),
                    to_json_column(&project.recommendations)?,
                    project.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "project", || duplicate_key(project)))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "project",
                id: project.id,
            });
        }
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        self.conn()
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_project_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn get_project_by_external_id(&self, external_id: &str) -> RepoResult<Option<Project>> {
        self.conn()
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE external_id = ?1;"),
                [external_id],
                |row| Ok(parse_project_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY created_at ASC, uuid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM projects WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "project",
                id,
            });
        }
        Ok(())
    }
}

fn duplicate_key(project: &Project) -> String {
    project
        .external_id
        .clone()
        .unwrap_or_else(|| project.id.to_string())
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let uuid_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;
    let status = ProjectStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid project status `{status_text}`"))
    })?;
    let priority_text: String = row.get("priority")?;
    let priority = ProjectPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid project priority `{priority_text}`"))
    })?;
    let risk_level = match row.get::<_, Option<String>>("risk_level")? {
        Some(value) => Some(RiskLevel::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid risk level `{value}`"))
        })?),
        None => None,
    };
    let team_json: String = row.get("team_ids")?;
    let recommendations_json: String = row.get("recommendations")?;

    let project = Project {
        id: parse_uuid_column("projects.uuid", &uuid_text)?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        priority,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        budget: row.get("budget")?,
        budget_executed: row.get("budget_executed")?,
        owner_id: parse_optional_uuid_column("projects.owner_id", row.get("owner_id")?)?,
        team_ids: from_json_column("projects.team_ids", &team_json)?,
        external_id: row.get("external_id")?,
        viability_score: row.get("viability_score")?,
        risk_level,
        recommendations: from_json_column("projects.recommendations", &recommendations_json)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    project.validate()?;
    Ok(project)
}
