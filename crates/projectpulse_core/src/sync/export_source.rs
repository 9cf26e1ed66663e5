//! File-backed external source.
//!
//! Serves records from a JSON export of the external workspace, shaped as
//! `{ "projects": [page, ...], "activities": [page, ...] }`, with the same
//! cursor pagination contract as a live source.
//!
//! # Invariants
//! - A source opened with `from_path` rereads its file whenever a project
//!   listing starts (no cursor), so each sync run sees the current export.
//! - Entries that do not decode as records are reported per page as
//!   rejected; the rest of the document is still served.
//! - After a failed reload, both listings fail until the next good reload.

use super::source::{
    EntityKind, ExternalSource, PageRequest, RawRecord, RejectedRecord, SourceError, SourcePage,
    SourceResult,
};
use log::info;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default, Deserialize)]
struct ExportDocument {
    #[serde(default)]
    projects: Vec<Value>,
    #[serde(default)]
    activities: Vec<Value>,
}

type ExportEntry = Result<RawRecord, RejectedRecord>;

#[derive(Debug, Default)]
struct ExportRecords {
    projects: Vec<ExportEntry>,
    activities: Vec<ExportEntry>,
}

impl ExportRecords {
    fn from_document(document: ExportDocument) -> Self {
        Self {
            projects: decode_entries(document.projects),
            activities: decode_entries(document.activities),
        }
    }

    fn entries(&self, entity: EntityKind) -> &[ExportEntry] {
        match entity {
            EntityKind::Project => &self.projects,
            EntityKind::Activity => &self.activities,
        }
    }
}

fn decode_entries(values: Vec<Value>) -> Vec<ExportEntry> {
    values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            let id = value.get("id").map(|id| match id {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
            serde_json::from_value::<RawRecord>(value).map_err(|err| RejectedRecord {
                position,
                id,
                message: err.to_string(),
            })
        })
        .collect()
}

/// Source over an export document, optionally tied to a file on disk.
#[derive(Debug)]
pub struct JsonExportSource {
    source_id: String,
    path: Option<PathBuf>,
    records: Mutex<Result<ExportRecords, String>>,
}

impl JsonExportSource {
    pub fn from_records(projects: Vec<RawRecord>, activities: Vec<RawRecord>) -> Self {
        let records = ExportRecords {
            projects: projects.into_iter().map(Ok).collect(),
            activities: activities.into_iter().map(Ok).collect(),
        };
        Self {
            source_id: "export".to_string(),
            path: None,
            records: Mutex::new(Ok(records)),
        }
    }

    /// Parses an export document held in memory.
    pub fn from_json_str(source_id: impl Into<String>, content: &str) -> SourceResult<Self> {
        let source_id = source_id.into();
        let records = parse_document(content).map_err(|message| {
            SourceError::unavailable(source_id.clone(), EntityKind::Project, message)
        })?;
        Ok(Self {
            source_id,
            path: None,
            records: Mutex::new(Ok(records)),
        })
    }

    /// Opens an export file. The file stem becomes the source id.
    ///
    /// # Errors
    /// - The file cannot be read or is not an export document.
    pub fn from_path(path: &Path) -> SourceResult<Self> {
        let source_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        let records = read_document(path).map_err(|message| {
            SourceError::unavailable(source_id.clone(), EntityKind::Project, message)
        })?;
        Ok(Self {
            source_id,
            path: Some(path.to_path_buf()),
            records: Mutex::new(Ok(records)),
        })
    }

    fn reload(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let loaded = read_document(path);
        if let Ok(records) = &loaded {
            info!(
                "event=export_reload module=sync status=ok source={} projects={} activities={}",
                self.source_id,
                records.projects.len(),
                records.activities.len()
            );
        }
        *self.lock() = loaded;
    }

    fn lock(&self) -> MutexGuard<'_, Result<ExportRecords, String>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page(&self, entity: EntityKind, request: &PageRequest) -> SourceResult<SourcePage> {
        let offset = match request.cursor.as_deref() {
            None => 0,
            Some(cursor) => cursor.parse::<usize>().map_err(|_| SourceError {
                retryable: false,
                ..SourceError::unavailable(
                    self.source_id.clone(),
                    entity,
                    format!("invalid cursor `{cursor}`"),
                )
            })?,
        };

        let guard = self.lock();
        let entries = match &*guard {
            Ok(records) => records.entries(entity),
            Err(message) => {
                return Err(SourceError::unavailable(
                    self.source_id.clone(),
                    entity,
                    message.clone(),
                ))
            }
        };

        let page_size = usize::try_from(request.page_size.max(1)).unwrap_or(usize::MAX);
        let end = offset.saturating_add(page_size).min(entries.len());
        let start = offset.min(end);
        let has_more = end < entries.len();

        let mut page = SourcePage {
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
            ..SourcePage::default()
        };
        for entry in &entries[start..end] {
            match entry {
                Ok(record) => page.records.push(record.clone()),
                Err(rejected) => page.rejected.push(rejected.clone()),
            }
        }
        Ok(page)
    }
}

fn parse_document(content: &str) -> Result<ExportRecords, String> {
    serde_json::from_str::<ExportDocument>(content)
        .map(ExportRecords::from_document)
        .map_err(|err| format!("invalid export document: {err}"))
}

fn read_document(path: &Path) -> Result<ExportRecords, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("cannot read `{}`: {err}", path.display()))?;
    parse_document(&content)
}

impl ExternalSource for JsonExportSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn list_projects(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        if request.cursor.is_none() {
            self.reload();
        }
        self.page(EntityKind::Project, request)
    }

    fn list_activities(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        self.page(EntityKind::Activity, request)
    }
}

#[cfg(test)]
mod tests {
    use super::JsonExportSource;
    use crate::sync::source::{ExternalSource, PageRequest, RawRecord};
    use serde_json::json;

    fn records(count: usize) -> Vec<RawRecord> {
        (0..count)
            .map(|index| RawRecord::new(format!("page-{index}"), json!({})))
            .collect()
    }

    fn first_page(size: u32) -> PageRequest {
        PageRequest {
            cursor: None,
            page_size: size,
        }
    }

    #[test]
    fn pages_through_records_with_cursor() {
        let source = JsonExportSource::from_records(records(5), Vec::new());

        let first = source.list_projects(&first_page(2)).unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let last = source
            .list_projects(&PageRequest {
                cursor: Some("4".to_string()),
                page_size: 2,
            })
            .unwrap();
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.records[0].id, "page-4");
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn rejects_garbage_cursor() {
        let source = JsonExportSource::from_records(records(1), Vec::new());
        let err = source
            .list_projects(&PageRequest {
                cursor: Some("abc".to_string()),
                page_size: 10,
            })
            .unwrap_err();
        assert!(!err.retryable);
        assert!(err.message.contains("invalid cursor"));
    }

    #[test]
    fn parses_export_document_with_missing_sections() {
        let source = JsonExportSource::from_json_str(
            "workspace",
            r#"{ "projects": [ { "id": "p1", "properties": {} } ] }"#,
        )
        .unwrap();
        assert_eq!(source.source_id(), "workspace");
        let page = source.list_activities(&first_page(10)).unwrap();
        assert!(page.records.is_empty());
    }

    #[test]
    fn undecodable_entry_is_rejected_without_failing_the_page() {
        let source = JsonExportSource::from_json_str(
            "workspace",
            r#"{ "projects": [
                { "id": "p1" },
                { "id": 42, "properties": {} },
                "not a record",
                { "id": "p4" }
            ] }"#,
        )
        .unwrap();

        let page = source.list_projects(&first_page(10)).unwrap();
        let ids: Vec<&str> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p4"]);
        assert_eq!(page.rejected.len(), 2);
        assert_eq!(page.rejected[0].position, 1);
        assert_eq!(page.rejected[0].id.as_deref(), Some("42"));
        assert_eq!(page.rejected[1].position, 2);
        assert_eq!(page.rejected[1].id, None);
    }

    #[test]
    fn reads_export_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("udfv.json");
        std::fs::write(&path, r#"{ "activities": [ { "id": "a1" } ] }"#).unwrap();

        let source = JsonExportSource::from_path(&path).unwrap();
        assert_eq!(source.source_id(), "udfv");
        let page = source.list_activities(&first_page(10)).unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn file_source_rereads_export_at_each_listing_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        std::fs::write(&path, r#"{ "projects": [ { "id": "p1" } ] }"#).unwrap();
        let source = JsonExportSource::from_path(&path).unwrap();
        assert_eq!(source.list_projects(&first_page(10)).unwrap().records.len(), 1);

        std::fs::write(
            &path,
            r#"{ "projects": [ { "id": "p1" }, { "id": "p2" } ] }"#,
        )
        .unwrap();
        assert_eq!(source.list_projects(&first_page(10)).unwrap().records.len(), 2);

        std::fs::remove_file(&path).unwrap();
        let err = source.list_projects(&first_page(10)).unwrap_err();
        assert!(err.retryable);
        assert!(source.list_activities(&first_page(10)).is_err());
        assert!(source.check_connection().is_err());
    }
}
