//! Sync run outcome reported to callers and presentation.

use super::merge::{MergeOutcome, OrphanedActivity};
use serde::Serialize;

/// Insert/update/unchanged counts for one entity family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeTally {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl MergeTally {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted(_) => self.inserted += 1,
            MergeOutcome::Updated(_) => self.updated += 1,
            MergeOutcome::Unchanged(_) => self.unchanged += 1,
        }
    }

    /// Records merged successfully, whether or not they changed anything.
    pub fn merged(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Summary of one finished sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// `true` when the run recorded no error.
    pub success: bool,
    pub processed_count: usize,
    /// Error messages in the order they occurred.
    pub errors: Vec<String>,
    pub projects: MergeTally,
    pub activities: MergeTally,
    pub orphaned: Vec<OrphanedActivity>,
    pub pages_fetched: u32,
    /// A fetch stopped at the page limit while the source still had more.
    pub truncated: bool,
    pub timed_out: bool,
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
}

impl SyncReport {
    pub(crate) fn started(started_at_ms: i64) -> Self {
        Self {
            started_at_ms,
            finished_at_ms: started_at_ms,
            ..Self::default()
        }
    }

    pub(crate) fn finish(&mut self, finished_at_ms: i64) {
        self.processed_count = self.projects.merged() + self.activities.merged();
        self.success = self.errors.is_empty();
        self.finished_at_ms = finished_at_ms.max(self.started_at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::{MergeTally, SyncReport};
    use crate::sync::merge::MergeOutcome;
    use uuid::Uuid;

    #[test]
    fn finish_derives_counts_and_success() {
        let mut report = SyncReport::started(1_000);
        report.projects.record(MergeOutcome::Inserted(Uuid::new_v4()));
        report.activities.record(MergeOutcome::Unchanged(Uuid::new_v4()));
        report.activities.record(MergeOutcome::Updated(Uuid::new_v4()));
        report.finish(900);

        assert!(report.success);
        assert_eq!(report.processed_count, 3);
        assert_eq!(report.finished_at_ms, 1_000);

        report.errors.push("boom".to_string());
        report.finish(1_200);
        assert!(!report.success);
    }

    #[test]
    fn tally_counts_every_outcome_as_merged() {
        let mut tally = MergeTally::default();
        tally.record(MergeOutcome::Unchanged(Uuid::new_v4()));
        tally.record(MergeOutcome::Unchanged(Uuid::new_v4()));
        assert_eq!(tally.merged(), 2);
        assert_eq!(tally.inserted, 0);
    }
}
