//! Persisted sync outcome.
//!
//! # Invariants
//! - At most one row exists; every save replaces it.
//! - A loaded state is never `in_progress`.

use super::{from_json_column, to_json_column, RepoError, RepoResult, SqliteStore};
use crate::sync::state::SyncState;
use rusqlite::{params, OptionalExtension};

/// Storage for the latest finished sync run.
pub trait SyncStateRepository {
    fn save_sync_state(&self, state: &SyncState) -> RepoResult<()>;
    /// Returns `None` when no sync has ever finished against this store.
    fn load_sync_state(&self) -> RepoResult<Option<SyncState>>;
}

impl SyncStateRepository for SqliteStore<'_> {
    fn save_sync_state(&self, state: &SyncState) -> RepoResult<()> {
        let processed = i64::try_from(state.processed_count).map_err(|_| {
            RepoError::InvalidData(format!(
                "processed count {} does not fit the store",
                state.processed_count
            ))
        })?;

        self.conn().execute(
            "INSERT INTO sync_state (id, last_sync_at, processed_count, errors, orphaned_activities)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                last_sync_at = excluded.last_sync_at,
                processed_count = excluded.processed_count,
                errors = excluded.errors,
                orphaned_activities = excluded.orphaned_activities;",
            params![
                state.last_sync_at_ms,
                processed,
                to_json_column(&state.errors)?,
                to_json_column(&state.orphaned_activities)?,
            ],
        )?;
        Ok(())
    }

    fn load_sync_state(&self) -> RepoResult<Option<SyncState>> {
        let row = self
            .conn()
            .query_row(
                "SELECT last_sync_at, processed_count, errors, orphaned_activities
                 FROM sync_state WHERE id = 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((last_sync_at_ms, processed, errors, orphaned)) = row else {
            return Ok(None);
        };
        let processed_count = usize::try_from(processed).map_err(|_| {
            RepoError::InvalidData(format!("negative processed_count {processed} in sync_state"))
        })?;

        Ok(Some(SyncState {
            in_progress: false,
            last_sync_at_ms,
            errors: from_json_column("sync_state.errors", &errors)?,
            processed_count,
            orphaned_activities: from_json_column("sync_state.orphaned_activities", &orphaned)?,
        }))
    }
}
