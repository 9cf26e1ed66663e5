//! External-source reconciliation pipeline.
//!
//! # Responsibility
//! - Page raw records out of an `ExternalSource`.
//! - Translate them into partial local entities.
//! - Merge partials into storage and track the run in `SyncState`.
//!
//! # See also
//! - `reconciler` for the run protocol.

pub mod export_source;
pub mod mapping;
pub mod merge;
pub mod reconciler;
pub mod report;
pub mod source;
pub mod state;
pub mod trigger;

pub use export_source::JsonExportSource;
pub use mapping::{
    map_external_activity, map_external_project, map_status, MappingError, PartialActivity,
    PartialProject, StatusLabel,
};
pub use merge::{ActivityMerge, MergeError, MergeOutcome, OrphanedActivity};
pub use reconciler::{SyncError, SyncReconciler};
pub use report::{MergeTally, SyncReport};
pub use source::{
    EntityKind, ExternalSource, PageRequest, RawRecord, RejectedRecord, SourceError, SourcePage,
    SourceResult,
};
pub use state::{SyncRun, SyncState, SyncStateHandle};
pub use trigger::{handle_webhook, parse_webhook, SyncSchedule, WebhookError, WebhookNotification};
