//! User repository contract and SQLite implementation.

use super::{
    bool_to_int, from_json_column, map_unique_violation, parse_uuid_column, to_json_column,
    RepoError, RepoResult, SqliteStore,
};
use crate::model::user::{normalize_email, User, UserId, UserRole};
use rusqlite::{params, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    role,
    is_active,
    hourly_cost,
    specialties,
    created_at,
    updated_at
FROM users";

/// Repository interface for team members.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Looks up a user by email, case-insensitively.
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Lists users ordered by `name ASC, uuid ASC`.
    fn list_users(&self) -> RepoResult<Vec<User>>;
}

impl UserRepository for SqliteStore<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        self.conn()
            .execute(
                "INSERT INTO users (
                    uuid, name, email, role, is_active,
                    hourly_cost, specialties, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    normalize_email(&user.email),
                    user.role.as_str(),
                    bool_to_int(user.active),
                    user.hourly_cost,
                    to_json_column(&user.specialties)?,
                    user.created_at,
                    user.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "user", || user.email.clone()))?;

        Ok(user.id)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        let changed = self
            .conn()
            .execute(
                "UPDATE users
                 SET
                    name = ?2,
                    email = ?3,
                    role = ?4,
                    is_active = ?5,
                    hourly_cost = ?6,
                    specialties = ?7,
                    updated_at = ?8
                 WHERE uuid = ?1;",
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    normalize_email(&user.email),
                    user.role.as_str(),
                    bool_to_int(user.active),
                    user.hourly_cost,
                    to_json_column(&user.specialties)?,
                    user.updated_at,
                ],
            )
            .map_err(|err| map_unique_violation(err, "user", || user.email.clone()))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn()
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.conn()
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE email = ?1;"),
                [normalize_email(email)],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY name ASC, uuid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid user role `{role_text}`")))?;
    let active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in users.is_active"
            )));
        }
    };
    let specialties_json: String = row.get("specialties")?;

    let user = User {
        id: parse_uuid_column("users.uuid", &uuid_text)?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
        active,
        hourly_cost: row.get("hourly_cost")?,
        specialties: from_json_column("users.specialties", &specialties_json)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate()?;
    Ok(user)
}
