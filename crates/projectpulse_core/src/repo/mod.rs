//! Storage collaborator: repository contracts and the SQLite store.
//!
//! # Responsibility
//! - Define CRUD contracts over projects, activities and users.
//! - Persist the latest sync outcome so status survives restarts.
//! - Provide external-id and email lookups used by sync merges.
//! - Keep SQL details out of sync and analytics code.
//!
//! # Invariants
//! - Writes call the entity `validate()` before any SQL mutation.
//! - Reads reject invalid persisted state instead of masking it.
//! - External ids are unique per entity table when present.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod activity_repo;
pub mod project_repo;
pub mod sync_state_repo;
pub mod user_repo;

pub use activity_repo::{ActivityListQuery, ActivityRepository};
pub use project_repo::ProjectRepository;
pub use sync_state_repo::SyncStateRepository;
pub use user_repo::UserRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all entity stores.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// A unique key (email, external id) is already taken by another row.
    Duplicate { entity: &'static str, key: String },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate { entity, key } => write!(f, "{entity} already exists for `{key}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Everything the sync reconciler and portfolio service need from storage.
pub trait PortfolioStore:
    ProjectRepository + ActivityRepository + UserRepository + SyncStateRepository
{
}

impl<T> PortfolioStore for T where
    T: ProjectRepository + ActivityRepository + UserRepository + SyncStateRepository
{
}

/// SQLite-backed store implementing every repository contract.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps a connection returned by `open_db*`.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }
}

pub(crate) fn to_json_column<T: Serialize>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode column value: {err}")))
}

pub(crate) fn from_json_column<T: DeserializeOwned>(column: &str, raw: &str) -> RepoResult<T> {
    serde_json::from_str(raw)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}

pub(crate) fn parse_uuid_column(column: &str, raw: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{raw}` in {column}")))
}

pub(crate) fn parse_optional_uuid_column(
    column: &str,
    raw: Option<String>,
) -> RepoResult<Option<Uuid>> {
    raw.map(|value| parse_uuid_column(column, &value))
        .transpose()
}

/// Maps SQLite unique-constraint failures to `RepoError::Duplicate`.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    key: impl FnOnce() -> String,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            RepoError::Duplicate { entity, key: key() }
        }
        _ => RepoError::from(err),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
