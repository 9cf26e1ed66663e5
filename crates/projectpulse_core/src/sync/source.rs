//! External source contract.
//!
//! # Responsibility
//! - Describe how the reconciler pages through external project/activity
//!   records without knowing the transport behind them.
//!
//! # Invariants
//! - A page with `has_more=true` carries the cursor for the next page.
//! - Raw records keep the external property bag untouched; interpretation is
//!   the mapping layer's job.
//! - A record the source cannot decode is reported in `SourcePage::rejected`
//!   and never fails the page it arrived on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entity families exchanged with the external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Activity,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Activity => "activity",
        }
    }
}

/// One external page: a stable id plus a heterogeneous property bag.
///
/// Missing fields deserialize to empty values so that malformed records still
/// reach the mapping layer instead of failing the whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: Value,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, properties: Value) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    /// Returns the first non-null property among `names`.
    pub fn first_property(&self, names: &[String]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.properties.get(name.as_str()))
            .find(|value| !value.is_null())
    }
}

/// Cursor-based page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub page_size: u32,
}

/// An entry the source returned but could not decode into a `RawRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Zero-based position of the entry in the full listing.
    pub position: usize,
    /// The entry's id when one could be read, even if it had the wrong type.
    pub id: Option<String>,
    pub message: String,
}

/// One page of raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub records: Vec<RawRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub type SourceResult<T> = Result<T, SourceError>;

/// The source could not serve a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub source_id: String,
    pub entity: EntityKind,
    pub message: String,
    pub retryable: bool,
}

impl SourceError {
    pub fn unavailable(
        source_id: impl Into<String>,
        entity: EntityKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            entity,
            message: message.into(),
            retryable: true,
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "source `{}` unavailable while listing {} records: {}",
            self.source_id,
            self.entity.as_str(),
            self.message
        )
    }
}

impl Error for SourceError {}

/// Read-only adapter over an external project-tracking workspace.
pub trait ExternalSource {
    fn source_id(&self) -> &str;
    fn list_projects(&self, request: &PageRequest) -> SourceResult<SourcePage>;
    fn list_activities(&self, request: &PageRequest) -> SourceResult<SourcePage>;

    /// Confirms the source can serve at least its first project page.
    fn check_connection(&self) -> SourceResult<()> {
        self.list_projects(&PageRequest {
            cursor: None,
            page_size: 1,
        })
        .map(|_| ())
    }

    /// Dispatches a page request by entity kind.
    fn list(&self, entity: EntityKind, request: &PageRequest) -> SourceResult<SourcePage> {
        match entity {
            EntityKind::Project => self.list_projects(request),
            EntityKind::Activity => self.list_activities(request),
        }
    }
}

impl<T: ExternalSource + ?Sized> ExternalSource for &T {
    fn source_id(&self) -> &str {
        (**self).source_id()
    }

    fn list_projects(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        (**self).list_projects(request)
    }

    fn list_activities(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        (**self).list_activities(request)
    }

    fn check_connection(&self) -> SourceResult<()> {
        (**self).check_connection()
    }
}
