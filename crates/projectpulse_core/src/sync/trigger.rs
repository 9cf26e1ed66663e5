//! Sync triggers: webhook notifications and the recurring schedule.
//!
//! # Invariants
//! - An invalid notification never starts a sync.
//! - A valid notification starts a full sync; the record id is only logged.

use super::reconciler::{SyncError, SyncReconciler};
use super::report::SyncReport;
use super::source::ExternalSource;
use crate::repo::PortfolioStore;
use log::{info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Change notification pushed by the external workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookNotification {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub record_id: String,
}

impl WebhookNotification {
    pub fn validate(&self) -> Result<(), WebhookError> {
        if self.event_type.trim().is_empty() {
            return Err(WebhookError::InvalidPayload(
                "eventType is required".to_string(),
            ));
        }
        if self.record_id.trim().is_empty() {
            return Err(WebhookError::InvalidPayload(
                "recordId is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum WebhookError {
    InvalidPayload(String),
    Sync(SyncError),
}

impl Display for WebhookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPayload(message) => write!(f, "invalid webhook payload: {message}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WebhookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPayload(_) => None,
            Self::Sync(err) => Some(err),
        }
    }
}

impl From<SyncError> for WebhookError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// Parses a raw webhook body.
pub fn parse_webhook(body: &str) -> Result<WebhookNotification, WebhookError> {
    serde_json::from_str(body).map_err(|err| WebhookError::InvalidPayload(err.to_string()))
}

/// Validates a notification and runs a full sync for it.
pub fn handle_webhook<S: ExternalSource, R: PortfolioStore>(
    reconciler: &SyncReconciler<S, R>,
    notification: &WebhookNotification,
) -> Result<SyncReport, WebhookError> {
    if let Err(err) = notification.validate() {
        warn!("event=webhook module=sync status=rejected error=\"{err}\"");
        return Err(err);
    }
    info!(
        "event=webhook module=sync status=accepted event_type={} record_id={}",
        notification.event_type, notification.record_id
    );
    Ok(reconciler.sync_from_source()?)
}

/// Fixed-interval schedule for recurring syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSchedule {
    interval: Duration,
    last_started_at_ms: Option<i64>,
}

impl SyncSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_started_at_ms: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First check is always due.
    pub fn next_due_at_ms(&self) -> Option<i64> {
        let interval_ms = i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX);
        self.last_started_at_ms
            .map(|last| last.saturating_add(interval_ms))
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_due_at_ms().map_or(true, |due| now_ms >= due)
    }

    pub fn mark_started(&mut self, now_ms: i64) {
        self.last_started_at_ms = Some(now_ms);
    }

    /// Runs a sync when due. Returns `None` when not due yet.
    pub fn run_if_due<S: ExternalSource, R: PortfolioStore>(
        &mut self,
        reconciler: &SyncReconciler<S, R>,
        now_ms: i64,
    ) -> Option<Result<SyncReport, SyncError>> {
        if !self.is_due(now_ms) {
            return None;
        }
        self.mark_started(now_ms);
        info!(
            "event=sync_schedule module=sync status=due interval_secs={}",
            self.interval.as_secs()
        );
        Some(reconciler.sync_from_source())
    }
}
