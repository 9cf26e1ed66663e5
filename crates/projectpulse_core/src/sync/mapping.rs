//! External record to local schema translation.
//!
//! # Responsibility
//! - Decode the external property shapes (title/rich text, select, date,
//!   number, relation, people) into plain values.
//! - Translate the external status and priority vocabulary.
//! - Produce partial entities that the merge step applies field by field.
//!
//! # Invariants
//! - Mapping never fails: malformed input yields a best-effort partial whose
//!   `issues` list explains what was dropped.
//! - A `None` field on a partial means "the source said nothing"; merge must
//!   keep the local value.

use super::source::{EntityKind, RawRecord};
use crate::config::{ActivityFieldNames, ProjectFieldNames};
use crate::model::activity::ActivityStatus;
use crate::model::project::{ProjectPriority, ProjectStatus};
use crate::model::user::normalize_email;
use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name given to new projects whose source record carries none.
pub const UNNAMED_PROJECT: &str = "Unnamed project";
/// Name given to new activities whose source record carries none.
pub const UNNAMED_ACTIVITY: &str = "Unnamed activity";

/// Per-record mapping failure that prevents a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The record has no usable external id, so it cannot be merged.
    MissingExternalId { entity: EntityKind },
    /// The source could not decode the entry into a record at all.
    MalformedRecord {
        entity: EntityKind,
        position: usize,
        message: String,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingExternalId { entity } => {
                write!(f, "{} record has no external id", entity.as_str())
            }
            Self::MalformedRecord {
                entity,
                position,
                message,
            } => write!(
                f,
                "{} entry #{position} is malformed: {message}",
                entity.as_str()
            ),
        }
    }
}

impl Error for MappingError {}

/// Unified status vocabulary across projects and activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Proposed,
    Approved,
    InProgress,
    Completed,
    Cancelled,
    Pending,
    Blocked,
}

impl StatusLabel {
    pub fn project_status(self) -> Option<ProjectStatus> {
        match self {
            Self::Proposed => Some(ProjectStatus::Proposed),
            Self::Approved => Some(ProjectStatus::Approved),
            Self::InProgress => Some(ProjectStatus::InProgress),
            Self::Completed => Some(ProjectStatus::Completed),
            Self::Cancelled => Some(ProjectStatus::Cancelled),
            Self::Pending | Self::Blocked => None,
        }
    }

    pub fn activity_status(self) -> Option<ActivityStatus> {
        match self {
            Self::Pending => Some(ActivityStatus::Pending),
            Self::InProgress => Some(ActivityStatus::InProgress),
            Self::Completed => Some(ActivityStatus::Completed),
            Self::Blocked => Some(ActivityStatus::Blocked),
            Self::Proposed | Self::Approved | Self::Cancelled => None,
        }
    }
}

// Case-sensitive on purpose: the external workspace uses these exact labels.
const STATUS_TABLE: &[(&str, StatusLabel)] = &[
    ("Propuesta", StatusLabel::Proposed),
    ("Aprobado", StatusLabel::Approved),
    ("En Progreso", StatusLabel::InProgress),
    ("En progreso", StatusLabel::InProgress),
    ("Completado", StatusLabel::Completed),
    ("Finalizado", StatusLabel::Completed),
    ("Cancelado", StatusLabel::Cancelled),
    ("Pendiente", StatusLabel::Pending),
    ("Bloqueada", StatusLabel::Blocked),
];

const PRIORITY_TABLE: &[(&str, ProjectPriority)] = &[
    ("Baja", ProjectPriority::Low),
    ("Media", ProjectPriority::Medium),
    ("Alta", ProjectPriority::High),
    ("Crítica", ProjectPriority::Critical),
    ("Critica", ProjectPriority::Critical),
];

/// Looks up an external status label.
pub fn lookup_status(label: &str) -> Option<StatusLabel> {
    STATUS_TABLE
        .iter()
        .find(|(external, _)| *external == label)
        .map(|(_, status)| *status)
}

/// Translates an external status label, falling back to `Proposed`.
pub fn map_status(label: &str) -> StatusLabel {
    lookup_status(label).unwrap_or(StatusLabel::Proposed)
}

pub fn map_priority(label: &str) -> Option<ProjectPriority> {
    PRIORITY_TABLE
        .iter()
        .find(|(external, _)| *external == label)
        .map(|(_, priority)| *priority)
}

/// Concatenates the text fragments of a title or rich-text property.
pub fn extract_text(property: Option<&Value>) -> String {
    let Some(property) = property else {
        return String::new();
    };
    if let Some(text) = property.as_str() {
        return text.to_string();
    }
    let fragments = property
        .get("title")
        .or_else(|| property.get("rich_text"))
        .and_then(Value::as_array);
    let Some(fragments) = fragments else {
        return String::new();
    };

    fragments
        .iter()
        .filter_map(|fragment| {
            fragment
                .get("plain_text")
                .or_else(|| fragment.get("text").and_then(|text| text.get("content")))
                .and_then(Value::as_str)
        })
        .collect()
}

/// Returns the selected option label, or an empty string when unset.
pub fn extract_select(property: Option<&Value>) -> String {
    property
        .and_then(|value| value.get("select").or_else(|| value.get("status")))
        .and_then(|option| option.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Raw start of a date range property.
pub fn extract_date_text(property: Option<&Value>) -> Option<&str> {
    property?
        .get("date")?
        .get("start")?
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Start of a date range property as epoch milliseconds.
pub fn extract_date(property: Option<&Value>) -> Option<i64> {
    extract_date_text(property).and_then(parse_date)
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(text: &str) -> Option<i64> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|datetime| datetime.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|datetime| datetime.timestamp_millis())
}

pub fn extract_number(property: Option<&Value>) -> Option<f64> {
    property?.get("number")?.as_f64()
}

/// Referenced page ids of a relation property, in source order.
pub fn extract_relation_ids(property: Option<&Value>) -> Vec<String> {
    property
        .and_then(|value| value.get("relation"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .filter(|id| !id.trim().is_empty())
                .map(|id| id.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Normalized person emails of a people property, in source order.
pub fn extract_people_emails(property: Option<&Value>) -> Vec<String> {
    let Some(property) = property else {
        return Vec::new();
    };
    if let Some(email) = property.get("email").and_then(Value::as_str) {
        return vec![normalize_email(email)];
    }
    property
        .get("people")
        .and_then(Value::as_array)
        .map(|people| {
            people
                .iter()
                .filter_map(|person| {
                    person
                        .get("person")
                        .and_then(|details| details.get("email"))
                        .and_then(Value::as_str)
                })
                .map(normalize_email)
                .filter(|email| !email.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Candidate project fields decoded from one external record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialProject {
    pub external_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub budget: Option<f64>,
    pub budget_executed: Option<f64>,
    pub owner_email: Option<String>,
    pub team_emails: Vec<String>,
    pub issues: Vec<String>,
}

impl PartialProject {
    /// Rejects partials that cannot be keyed for merge.
    pub fn check_key(&self) -> Result<&str, MappingError> {
        non_blank_key(&self.external_id, EntityKind::Project)
    }
}

/// Candidate activity fields decoded from one external record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialActivity {
    pub external_id: String,
    /// External id of the parent project page.
    pub project_external_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ActivityStatus>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub assignee_email: Option<String>,
    pub issues: Vec<String>,
}

impl PartialActivity {
    pub fn check_key(&self) -> Result<&str, MappingError> {
        non_blank_key(&self.external_id, EntityKind::Activity)
    }
}

fn non_blank_key(external_id: &str, entity: EntityKind) -> Result<&str, MappingError> {
    let key = external_id.trim();
    if key.is_empty() {
        return Err(MappingError::MissingExternalId { entity });
    }
    Ok(key)
}

/// Maps an external project record using the default field names.
pub fn map_external_project(raw: &RawRecord) -> PartialProject {
    map_project_with(raw, &ProjectFieldNames::default())
}

/// Maps an external activity record using the default field names.
pub fn map_external_activity(raw: &RawRecord) -> PartialActivity {
    map_activity_with(raw, &ActivityFieldNames::default())
}

/// Maps an external project record with configurable property names.
pub fn map_project_with(raw: &RawRecord, fields: &ProjectFieldNames) -> PartialProject {
    let mut issues = IssueLog::new(EntityKind::Project, &raw.id);

    let status_label = extract_select(raw.first_property(&fields.status));
    let status = if status_label.is_empty() {
        None
    } else {
        let status = lookup_status(&status_label).and_then(StatusLabel::project_status);
        if status.is_none() {
            issues.push(format!(
                "unknown project status `{status_label}`, using proposed"
            ));
        }
        Some(status.unwrap_or(ProjectStatus::Proposed))
    };

    let priority_label = extract_select(raw.first_property(&fields.priority));
    let priority = if priority_label.is_empty() {
        None
    } else {
        let priority = map_priority(&priority_label);
        if priority.is_none() {
            issues.push(format!("unknown priority `{priority_label}`"));
        }
        priority
    };

    let start_date = date_field(raw, &fields.start_date, "start date", &mut issues);
    let end_date = date_field(raw, &fields.end_date, "end date", &mut issues);
    let budget = amount_field(raw, &fields.budget, "budget", &mut issues);
    let budget_executed =
        amount_field(raw, &fields.budget_executed, "executed budget", &mut issues);

    PartialProject {
        external_id: raw.id.trim().to_string(),
        name: non_empty(extract_text(raw.first_property(&fields.name))),
        description: non_empty(extract_text(raw.first_property(&fields.description))),
        status,
        priority,
        start_date,
        end_date,
        budget,
        budget_executed,
        owner_email: extract_people_emails(raw.first_property(&fields.owner))
            .into_iter()
            .next(),
        team_emails: extract_people_emails(raw.first_property(&fields.team)),
        issues: issues.into_inner(),
    }
}

/// Maps an external activity record with configurable property names.
pub fn map_activity_with(raw: &RawRecord, fields: &ActivityFieldNames) -> PartialActivity {
    let mut issues = IssueLog::new(EntityKind::Activity, &raw.id);

    let status_label = extract_select(raw.first_property(&fields.status));
    let status = if status_label.is_empty() {
        None
    } else {
        let status = lookup_status(&status_label).and_then(StatusLabel::activity_status);
        if status.is_none() {
            issues.push(format!("untranslatable activity status `{status_label}`"));
        }
        status
    };

    let estimated_hours = match extract_number(raw.first_property(&fields.estimated_hours)) {
        Some(hours) if hours > 0.0 => Some(hours),
        Some(hours) => {
            issues.push(format!("ignored non-positive estimated hours {hours}"));
            None
        }
        None => None,
    };
    let actual_hours = amount_field(raw, &fields.actual_hours, "actual hours", &mut issues);
    let start_date = date_field(raw, &fields.start_date, "start date", &mut issues);
    let end_date = date_field(raw, &fields.end_date, "end date", &mut issues);

    PartialActivity {
        external_id: raw.id.trim().to_string(),
        project_external_id: extract_relation_ids(raw.first_property(&fields.project))
            .into_iter()
            .next(),
        name: non_empty(extract_text(raw.first_property(&fields.name))),
        description: non_empty(extract_text(raw.first_property(&fields.description))),
        status,
        estimated_hours,
        actual_hours,
        start_date,
        end_date,
        assignee_email: extract_people_emails(raw.first_property(&fields.assignee))
            .into_iter()
            .next(),
        issues: issues.into_inner(),
    }
}

fn date_field(
    raw: &RawRecord,
    names: &[String],
    label: &str,
    issues: &mut IssueLog<'_>,
) -> Option<i64> {
    let text = extract_date_text(raw.first_property(names))?;
    let parsed = parse_date(text);
    if parsed.is_none() {
        issues.push(format!("unparseable {label} `{text}`"));
    }
    parsed
}

fn amount_field(
    raw: &RawRecord,
    names: &[String],
    label: &str,
    issues: &mut IssueLog<'_>,
) -> Option<f64> {
    match extract_number(raw.first_property(names)) {
        Some(value) if value < 0.0 => {
            issues.push(format!("ignored negative {label} {value}"));
            None
        }
        other => other,
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Collects mapping issues for one record and logs each as it is found.
struct IssueLog<'a> {
    entity: EntityKind,
    external_id: &'a str,
    issues: Vec<String>,
}

impl<'a> IssueLog<'a> {
    fn new(entity: EntityKind, external_id: &'a str) -> Self {
        Self {
            entity,
            external_id,
            issues: Vec::new(),
        }
    }

    fn push(&mut self, issue: String) {
        log::warn!(
            "event=map_record module=sync status=degraded entity={} external_id={} issue=\"{}\"",
            self.entity.as_str(),
            self.external_id,
            issue
        );
        self.issues.push(issue);
    }

    fn into_inner(self) -> Vec<String> {
        self.issues
    }
}
