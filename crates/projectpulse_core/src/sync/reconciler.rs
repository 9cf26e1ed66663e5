//! Fetch, map and merge external records into local storage.
//!
//! # Responsibility
//! - Drive one sequential sync run against an `ExternalSource`.
//! - Accumulate per-record failures without aborting the run.
//! - Publish the outcome through the shared `SyncStateHandle` and persist it
//!   in the store for later status queries.
//!
//! # Invariants
//! - At most one run is active per state handle.
//! - Projects are merged before activities.
//! - A source failure stops only the remaining fetch of that entity family.
//! - An entry the source could not decode counts as one failed record.
//! - Re-running against an unchanged source writes nothing.

use super::mapping::{map_activity_with, map_project_with, MappingError};
use super::merge::{merge_activity, merge_project, ActivityMerge};
use super::report::SyncReport;
use super::source::{EntityKind, ExternalSource, PageRequest, RawRecord};
use super::state::{SyncState, SyncStateHandle};
use crate::config::{FieldMapping, SyncConfig};
use crate::model::now_epoch_ms;
use crate::repo::PortfolioStore;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// A sync run could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    AlreadyRunning,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "a sync run is already in progress"),
        }
    }
}

impl Error for SyncError {}

/// Reconciles one external source into one local store.
pub struct SyncReconciler<S, R> {
    source: S,
    store: R,
    state: SyncStateHandle,
    sync: SyncConfig,
    fields: FieldMapping,
}

impl<S: ExternalSource, R: PortfolioStore> SyncReconciler<S, R> {
    pub fn new(source: S, store: R, state: SyncStateHandle) -> Self {
        Self {
            source,
            store,
            state,
            sync: SyncConfig::default(),
            fields: FieldMapping::default(),
        }
    }

    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_field_mapping(mut self, fields: FieldMapping) -> Self {
        self.fields = fields;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state.snapshot()
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Runs one full sync.
    ///
    /// # Errors
    /// - `AlreadyRunning` when another run holds the state; nothing is touched.
    pub fn sync_from_source(&self) -> Result<SyncReport, SyncError> {
        let run = self.state.try_begin().ok_or_else(|| {
            warn!(
                "event=sync_run module=sync status=rejected source={} reason=already_running",
                self.source.source_id()
            );
            SyncError::AlreadyRunning
        })?;

        let started = Instant::now();
        let mut report = SyncReport::started(now_epoch_ms());
        info!(
            "event=sync_run module=sync status=start source={}",
            self.source.source_id()
        );

        let projects = self.fetch_all(EntityKind::Project, &mut report);
        let activities = self.fetch_all(EntityKind::Activity, &mut report);

        for raw in &projects {
            if self.deadline_reached(started, &mut report) {
                break;
            }
            self.reconcile_project(raw, &mut report);
        }
        for raw in &activities {
            if self.deadline_reached(started, &mut report) {
                break;
            }
            self.reconcile_activity(raw, &mut report);
        }

        report.finish(now_epoch_ms());
        run.finish(&report);
        self.persist_state();

        let status = if report.success { "ok" } else { "partial" };
        info!(
            "event=sync_run module=sync status={status} source={} processed={} errors={} orphaned={} pages={} truncated={} timed_out={} duration_ms={}",
            self.source.source_id(),
            report.processed_count,
            report.errors.len(),
            report.orphaned.len(),
            report.pages_fetched,
            report.truncated,
            report.timed_out,
            started.elapsed().as_millis()
        );
        Ok(report)
    }

    fn fetch_all(&self, entity: EntityKind, report: &mut SyncReport) -> Vec<RawRecord> {
        let page_size = match entity {
            EntityKind::Project => self.sync.project_page_size,
            EntityKind::Activity => self.sync.activity_page_size,
        };
        let mut records = Vec::new();
        let mut cursor = None;
        let mut pages = 0u32;

        loop {
            let request = PageRequest { cursor, page_size };
            let page = match self.source.list(entity, &request) {
                Ok(page) => page,
                Err(err) => {
                    error!(
                        "event=sync_fetch module=sync status=error source={} entity={} page={} retryable={} error=\"{}\"",
                        self.source.source_id(),
                        entity.as_str(),
                        pages + 1,
                        err.retryable,
                        err.message
                    );
                    report.errors.push(err.to_string());
                    break;
                }
            };
            pages += 1;
            report.pages_fetched += 1;
            records.extend(page.records);
            for rejected in page.rejected {
                let key = rejected
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("#{}", rejected.position));
                let err = MappingError::MalformedRecord {
                    entity,
                    position: rejected.position,
                    message: rejected.message,
                };
                self.record_failure(entity, &key, &err, report);
            }

            cursor = match page.next_cursor {
                Some(next) if page.has_more => Some(next),
                _ => break,
            };
            if pages >= self.sync.max_pages {
                warn!(
                    "event=sync_fetch module=sync status=truncated source={} entity={} max_pages={}",
                    self.source.source_id(),
                    entity.as_str(),
                    self.sync.max_pages
                );
                report.truncated = true;
                break;
            }
        }

        info!(
            "event=sync_fetch module=sync status=ok source={} entity={} pages={pages} records={}",
            self.source.source_id(),
            entity.as_str(),
            records.len()
        );
        records
    }

    fn persist_state(&self) {
        if let Err(err) = self.store.save_sync_state(&self.state.snapshot()) {
            error!(
                "event=sync_state_save module=sync status=error source={} error=\"{err}\"",
                self.source.source_id()
            );
        }
    }

    fn deadline_reached(&self, started: Instant, report: &mut SyncReport) -> bool {
        if report.timed_out {
            return true;
        }
        let Some(timeout) = self.sync.timeout() else {
            return false;
        };
        if started.elapsed() < timeout {
            return false;
        }
        warn!(
            "event=sync_run module=sync status=timeout source={} timeout_secs={}",
            self.source.source_id(),
            timeout.as_secs()
        );
        report.timed_out = true;
        report
            .errors
            .push(format!("sync timed out after {}s", timeout.as_secs()));
        true
    }

    fn reconcile_project(&self, raw: &RawRecord, report: &mut SyncReport) {
        let partial = map_project_with(raw, &self.fields.projects);
        if let Err(err) = partial.check_key() {
            self.record_failure(EntityKind::Project, &raw.id, &err, report);
            return;
        }
        match merge_project(&self.store, &partial, now_epoch_ms()) {
            Ok(outcome) => report.projects.record(outcome),
            Err(err) => self.record_failure(EntityKind::Project, &partial.external_id, &err, report),
        }
    }

    fn reconcile_activity(&self, raw: &RawRecord, report: &mut SyncReport) {
        let partial = map_activity_with(raw, &self.fields.activities);
        if let Err(err) = partial.check_key() {
            self.record_failure(EntityKind::Activity, &raw.id, &err, report);
            return;
        }
        match merge_activity(&self.store, &partial, now_epoch_ms()) {
            Ok(ActivityMerge::Merged(outcome)) => report.activities.record(outcome),
            Ok(ActivityMerge::Orphaned(orphan)) => {
                warn!(
                    "event=sync_merge module=sync status=orphaned entity=activity external_id={}",
                    orphan.external_id
                );
                report.orphaned.push(orphan);
            }
            Err(err) => {
                self.record_failure(EntityKind::Activity, &partial.external_id, &err, report)
            }
        }
    }

    fn record_failure(
        &self,
        entity: EntityKind,
        external_id: &str,
        err: &dyn Error,
        report: &mut SyncReport,
    ) {
        error!(
            "event=sync_merge module=sync status=error entity={} external_id={external_id} error=\"{err}\"",
            entity.as_str()
        );
        let key = if external_id.trim().is_empty() {
            "<missing id>"
        } else {
            external_id
        };
        report
            .errors
            .push(format!("{} `{key}`: {err}", entity.as_str()));
    }
}
