//! Process-wide sync state machine.
//!
//! # Responsibility
//! - Hold the latest sync outcome for status queries.
//! - Admit at most one sync run at a time.
//!
//! # Invariants
//! - Only a claimed `SyncRun` mutates the state after construction.
//! - A rejected claim leaves the state untouched.
//! - Every run returns the state to idle, including when it unwinds.

use super::merge::OrphanedActivity;
use super::report::SyncReport;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot of the sync state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub in_progress: bool,
    pub last_sync_at_ms: Option<i64>,
    pub errors: Vec<String>,
    pub processed_count: usize,
    pub orphaned_activities: Vec<OrphanedActivity>,
}

/// Shared, lock-guarded handle to the sync state.
#[derive(Debug, Clone, Default)]
pub struct SyncStateHandle {
    inner: Arc<Mutex<SyncState>>,
}

impl SyncStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the handle with a previously persisted outcome.
    ///
    /// A stored snapshot never carries a live run, so `in_progress` is cleared.
    pub fn from_snapshot(mut state: SyncState) -> Self {
        state.in_progress = false;
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> SyncState {
        self.lock().clone()
    }

    pub fn is_in_progress(&self) -> bool {
        self.lock().in_progress
    }

    /// Claims the single run slot, or returns `None` when a run is active.
    pub fn try_begin(&self) -> Option<SyncRun> {
        let mut state = self.lock();
        if state.in_progress {
            return None;
        }
        state.in_progress = true;
        Some(SyncRun {
            handle: self.clone(),
            finished: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        // State stays consistent across a panicking holder: every write is a
        // whole-field assignment.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard for one claimed sync run.
#[derive(Debug)]
pub struct SyncRun {
    handle: SyncStateHandle,
    finished: bool,
}

impl SyncRun {
    /// Publishes the run outcome and returns the state to idle.
    pub fn finish(mut self, report: &SyncReport) {
        let mut state = self.handle.lock();
        state.in_progress = false;
        state.last_sync_at_ms = Some(report.finished_at_ms);
        state.errors.clone_from(&report.errors);
        state.processed_count = report.processed_count;
        state.orphaned_activities.clone_from(&report.orphaned);
        drop(state);
        self.finished = true;
    }
}

impl Drop for SyncRun {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.handle.lock();
        state.in_progress = false;
        state.errors = vec!["sync run aborted before completion".to_string()];
        log::error!("event=sync_run module=sync status=aborted");
    }
}
