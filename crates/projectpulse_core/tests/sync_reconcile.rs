use projectpulse_core::config::SyncConfig;
use projectpulse_core::db::{open_db, open_db_in_memory};
use projectpulse_core::repo::{
    ActivityListQuery, ActivityRepository, ProjectRepository, SyncStateRepository,
    UserRepository,
};
use projectpulse_core::sync::{
    handle_webhook, parse_webhook, EntityKind, ExternalSource, JsonExportSource, PageRequest,
    RawRecord, SourceError, SourcePage, SourceResult, SyncSchedule, WebhookError,
};
use projectpulse_core::{
    ActivityStatus, ProjectPriority, ProjectStatus, SqliteStore, SyncError, SyncReconciler,
    SyncStateHandle, User, UserRole,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::time::Duration;

/// Source serving fixed pages, with an optional failing page per entity.
struct ScriptedSource {
    projects: Vec<Vec<RawRecord>>,
    activities: Vec<Vec<RawRecord>>,
    fail_projects_at: Option<usize>,
    fail_activities_at: Option<usize>,
    requests: RefCell<Vec<(EntityKind, Option<String>)>>,
}

impl ScriptedSource {
    fn new(projects: Vec<Vec<RawRecord>>, activities: Vec<Vec<RawRecord>>) -> Self {
        Self {
            projects,
            activities,
            fail_projects_at: None,
            fail_activities_at: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    fn serve(
        &self,
        entity: EntityKind,
        pages: &[Vec<RawRecord>],
        fail_at: Option<usize>,
        request: &PageRequest,
    ) -> SourceResult<SourcePage> {
        self.requests
            .borrow_mut()
            .push((entity, request.cursor.clone()));
        let index = match request.cursor.as_deref() {
            Some(cursor) => cursor.parse::<usize>().unwrap(),
            None => 0,
        };
        if fail_at == Some(index) {
            return Err(SourceError::unavailable("scripted", entity, "connection reset"));
        }
        let has_more = index + 1 < pages.len();
        Ok(SourcePage {
            records: pages.get(index).cloned().unwrap_or_default(),
            rejected: Vec::new(),
            next_cursor: has_more.then(|| (index + 1).to_string()),
            has_more,
        })
    }

    fn request_count(&self, entity: EntityKind) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(kind, _)| *kind == entity)
            .count()
    }
}

impl ExternalSource for ScriptedSource {
    fn source_id(&self) -> &str {
        "scripted"
    }

    fn list_projects(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        self.serve(
            EntityKind::Project,
            &self.projects,
            self.fail_projects_at,
            request,
        )
    }

    fn list_activities(&self, request: &PageRequest) -> SourceResult<SourcePage> {
        self.serve(
            EntityKind::Activity,
            &self.activities,
            self.fail_activities_at,
            request,
        )
    }
}

fn title(text: &str) -> Value {
    json!({ "title": [ { "plain_text": text } ] })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn people(email: &str) -> Value {
    json!({ "people": [ { "person": { "email": email } } ] })
}

fn project(id: &str, name: &str) -> RawRecord {
    RawRecord::new(id, json!({ "Nombre de Proyecto": title(name) }))
}

fn full_project(id: &str, name: &str, owner: &str) -> RawRecord {
    RawRecord::new(
        id,
        json!({
            "Nombre de Proyecto": title(name),
            "Estado": select("En Progreso"),
            "Prioridad": select("Alta"),
            "Fecha": { "date": { "start": "2024-03-01" } },
            "Fecha Fin": { "date": { "start": "2024-09-30" } },
            "Presupuesto": { "number": 120000.0 },
            "Presupuesto Ejecutado": { "number": 30000.0 },
            "Responsable": people(owner),
            "Equipo": people(owner),
        }),
    )
}

fn activity(id: &str, name: &str, project_ref: &str) -> RawRecord {
    RawRecord::new(
        id,
        json!({
            "Actividad Desarrollada": title(name),
            "Estado": select("Pendiente"),
            "Tiempo para completar tarea": { "number": 12.0 },
            "Proyecto": { "relation": [ { "id": project_ref } ] },
        }),
    )
}

fn reconciler<S: ExternalSource>(
    store: SqliteStore<'_>,
    source: S,
) -> SyncReconciler<S, SqliteStore<'_>> {
    SyncReconciler::new(source, store, SyncStateHandle::new())
}

#[test]
fn sync_maps_every_field_and_resolves_people() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let owner = User::new("Ana", "ana@example.com", UserRole::Coordinator, 1);
    store.create_user(&owner).unwrap();

    let mut assigned = activity("a-1", "Survey", "p-1");
    assigned.properties["Desarrollador de actividad"] = people("ANA@example.com");
    let source = ScriptedSource::new(
        vec![vec![full_project("p-1", "Irrigation", "ana@example.com")]],
        vec![vec![assigned]],
    );
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();
    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.processed_count, 2);

    let store = reconciler.store();
    let project = store.get_project_by_external_id("p-1").unwrap().unwrap();
    assert_eq!(project.name, "Irrigation");
    assert_eq!(project.status, ProjectStatus::InProgress);
    assert_eq!(project.priority, ProjectPriority::High);
    assert_eq!(project.start_date, Some(1_709_251_200_000));
    assert_eq!(project.budget, Some(120_000.0));
    assert_eq!(project.budget_executed, Some(30_000.0));
    assert_eq!(project.owner_id, Some(owner.id));
    assert!(project.team_ids.contains(&owner.id));

    let task = store.get_activity_by_external_id("a-1").unwrap().unwrap();
    assert_eq!(task.project_id, project.id);
    assert_eq!(task.status, ActivityStatus::Pending);
    assert_eq!(task.estimated_hours, 12.0);
    assert_eq!(task.assignee_id, Some(owner.id));
}

#[test]
fn second_sync_of_unchanged_source_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![vec![project("p-1", "Alpha"), project("p-2", "Beta")]],
        vec![vec![activity("a-1", "Survey", "p-1")]],
    );
    let reconciler = reconciler(store, source);

    let first = reconciler.sync_from_source().unwrap();
    let before = reconciler.store().list_projects().unwrap();
    let tasks_before = reconciler
        .store()
        .list_activities(&ActivityListQuery::default())
        .unwrap();

    let second = reconciler.sync_from_source().unwrap();
    let after = reconciler.store().list_projects().unwrap();
    let tasks_after = reconciler
        .store()
        .list_activities(&ActivityListQuery::default())
        .unwrap();

    assert_eq!(first.processed_count, 3);
    assert_eq!(second.processed_count, 3);
    assert_eq!(first.projects.inserted, 2);
    assert_eq!(second.projects.unchanged, 2);
    assert_eq!(second.activities.unchanged, 1);
    assert_eq!(second.projects.updated + second.activities.updated, 0);
    assert_eq!(before, after);
    assert_eq!(tasks_before, tasks_after);
}

#[test]
fn changed_field_updates_in_place() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut reconciler = reconciler(
        store,
        ScriptedSource::new(vec![vec![project("p-1", "Alpha")]], Vec::new()),
    );
    reconciler.sync_from_source().unwrap();
    let original = reconciler
        .store()
        .get_project_by_external_id("p-1")
        .unwrap()
        .unwrap();

    let mut renamed = project("p-1", "Alpha v2");
    renamed.properties["Estado"] = select("Completado");
    reconciler = SyncReconciler::new(
        ScriptedSource::new(vec![vec![renamed]], Vec::new()),
        SqliteStore::try_new(&conn).unwrap(),
        SyncStateHandle::new(),
    );
    let report = reconciler.sync_from_source().unwrap();

    assert_eq!(report.projects.updated, 1);
    let updated = reconciler
        .store()
        .get_project_by_external_id("p-1")
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.name, "Alpha v2");
    assert_eq!(updated.status, ProjectStatus::Completed);
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(reconciler.store().list_projects().unwrap().len(), 1);
}

#[test]
fn one_bad_record_does_not_abort_the_run() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![vec![
            project("p-1", "Alpha"),
            project("   ", "No key"),
            project("p-3", "Gamma"),
        ]],
        Vec::new(),
    );
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();

    assert!(!report.success);
    assert_eq!(report.processed_count, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("<missing id>"), "{}", report.errors[0]);
    assert_eq!(reconciler.store().list_projects().unwrap().len(), 2);

    let state = reconciler.state();
    assert_eq!(state.errors, report.errors);
    assert_eq!(state.processed_count, 2);
}

#[test]
fn activities_with_unknown_projects_are_reported_as_orphans() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![vec![project("p-1", "Alpha")]],
        vec![vec![
            activity("a-1", "Linked", "p-1"),
            activity("a-2", "Dangling", "p-missing"),
        ]],
    );
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();

    assert!(report.success);
    assert_eq!(report.processed_count, 2);
    assert_eq!(report.orphaned.len(), 1);
    let orphan = &report.orphaned[0];
    assert_eq!(orphan.external_id, "a-2");
    assert_eq!(orphan.project_external_id.as_deref(), Some("p-missing"));
    assert!(reconciler
        .store()
        .get_activity_by_external_id("a-2")
        .unwrap()
        .is_none());
    assert_eq!(reconciler.state().orphaned_activities, report.orphaned);
}

#[test]
fn sync_is_rejected_while_another_run_holds_the_state() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let state = SyncStateHandle::new();
    let reconciler = SyncReconciler::new(
        ScriptedSource::new(vec![vec![project("p-1", "Alpha")]], Vec::new()),
        store,
        state.clone(),
    );

    let held = state.try_begin().unwrap();
    let before = state.snapshot();
    assert_eq!(
        reconciler.sync_from_source().unwrap_err(),
        SyncError::AlreadyRunning
    );
    assert_eq!(state.snapshot(), before);
    assert!(reconciler.store().list_projects().unwrap().is_empty());

    drop(held);
    assert!(reconciler.sync_from_source().unwrap().success);
}

#[test]
fn pagination_follows_cursors_until_exhausted() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![
            vec![project("p-1", "One"), project("p-2", "Two")],
            vec![project("p-3", "Three")],
            vec![project("p-4", "Four")],
        ],
        vec![vec![activity("a-1", "Task", "p-4")]],
    );
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();

    assert_eq!(report.pages_fetched, 4);
    assert!(!report.truncated);
    assert_eq!(report.projects.inserted, 4);
    assert_eq!(report.activities.inserted, 1);
}

#[test]
fn page_limit_truncates_the_fetch() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![vec![project("p-1", "One")], vec![project("p-2", "Two")]],
        Vec::new(),
    );
    let reconciler = reconciler(store, source).with_sync_config(SyncConfig {
        max_pages: 1,
        ..SyncConfig::default()
    });

    let report = reconciler.sync_from_source().unwrap();

    assert!(report.truncated);
    assert_eq!(report.projects.inserted, 1);
    assert!(report.success);
}

#[test]
fn source_failure_keeps_records_fetched_before_it() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut source = ScriptedSource::new(
        vec![
            vec![project("p-1", "One")],
            vec![project("p-2", "Two")],
            vec![project("p-3", "Three")],
        ],
        vec![vec![activity("a-1", "Task", "p-1")]],
    );
    source.fail_projects_at = Some(1);
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();

    assert!(!report.success);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("connection reset"));
    assert_eq!(report.projects.inserted, 1);
    assert_eq!(report.activities.inserted, 1);
}

#[test]
fn activity_fetch_failure_leaves_projects_merged() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let mut source = ScriptedSource::new(
        vec![vec![project("p-1", "One")]],
        vec![vec![activity("a-1", "Task", "p-1")]],
    );
    source.fail_activities_at = Some(0);
    let reconciler = reconciler(store, source);

    let report = reconciler.sync_from_source().unwrap();

    assert_eq!(report.projects.inserted, 1);
    assert_eq!(report.activities.merged(), 0);
    assert_eq!(report.errors.len(), 1);
    assert!(!reconciler.state().in_progress);
}

#[test]
fn zero_timeout_stops_before_merging() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let reconciler = reconciler(
        store,
        ScriptedSource::new(vec![vec![project("p-1", "One")]], Vec::new()),
    )
    .with_sync_config(SyncConfig {
        timeout_secs: Some(0),
        ..SyncConfig::default()
    });

    let report = reconciler.sync_from_source().unwrap();

    assert!(report.timed_out);
    assert!(!report.success);
    assert_eq!(report.processed_count, 0);
    assert!(report.errors[0].contains("timed out"));
    assert!(!reconciler.state().in_progress);
}

#[test]
fn valid_webhook_triggers_full_sync() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let reconciler = reconciler(
        store,
        ScriptedSource::new(
            vec![vec![project("p-1", "One"), project("p-2", "Two")]],
            Vec::new(),
        ),
    );

    let notification =
        parse_webhook(r#"{"eventType":"page.updated","recordId":"p-1"}"#).unwrap();
    let report = handle_webhook(&reconciler, &notification).unwrap();

    assert_eq!(report.processed_count, 2);
    assert!(reconciler.state().last_sync_at_ms.is_some());
}

#[test]
fn invalid_webhook_runs_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let reconciler = reconciler(
        store,
        ScriptedSource::new(vec![vec![project("p-1", "One")]], Vec::new()),
    );

    let notification = parse_webhook(r#"{"eventType":"page.updated"}"#).unwrap();
    let err = handle_webhook(&reconciler, &notification).unwrap_err();

    assert!(matches!(err, WebhookError::InvalidPayload(_)));
    assert!(reconciler.state().last_sync_at_ms.is_none());
    assert!(reconciler.store().list_projects().unwrap().is_empty());
}

#[test]
fn schedule_runs_once_per_interval() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(vec![vec![project("p-1", "One")]], Vec::new());
    let reconciler = reconciler(store, source);
    let mut schedule = SyncSchedule::new(Duration::from_secs(60));

    assert!(schedule.run_if_due(&reconciler, 1_000).is_some());
    assert!(schedule.run_if_due(&reconciler, 30_000).is_none());
    let report = schedule.run_if_due(&reconciler, 61_000).unwrap().unwrap();
    assert_eq!(report.projects.unchanged, 1);
}

#[test]
fn request_count_matches_pages() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let source = ScriptedSource::new(
        vec![vec![project("p-1", "One")], vec![project("p-2", "Two")]],
        vec![vec![]],
    );
    let reconciler = SyncReconciler::new(&source, store, SyncStateHandle::new());

    reconciler.sync_from_source().unwrap();

    assert_eq!(source.request_count(EntityKind::Project), 2);
    assert_eq!(source.request_count(EntityKind::Activity), 1);
}

fn export_document(projects: &[RawRecord]) -> String {
    json!({ "projects": projects, "activities": [] }).to_string()
}

#[test]
fn scheduled_sync_picks_up_rewritten_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workspace.json");
    std::fs::write(&path, export_document(&[project("p-1", "One")])).unwrap();

    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let reconciler = reconciler(store, JsonExportSource::from_path(&path).unwrap());
    let mut schedule = SyncSchedule::new(Duration::from_secs(60));

    let first = schedule.run_if_due(&reconciler, 1_000).unwrap().unwrap();
    assert_eq!(first.projects.inserted, 1);

    std::fs::write(
        &path,
        export_document(&[project("p-1", "One renamed"), project("p-2", "Two")]),
    )
    .unwrap();
    let second = schedule.run_if_due(&reconciler, 61_000).unwrap().unwrap();

    assert_eq!(second.projects.inserted, 1);
    assert_eq!(second.projects.updated, 1);
    let names: Vec<String> = reconciler
        .store()
        .list_projects()
        .unwrap()
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert!(names.contains(&"One renamed".to_string()));
    assert!(names.contains(&"Two".to_string()));
}

#[test]
fn vanished_export_fails_the_run_without_reusing_old_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workspace.json");
    std::fs::write(&path, export_document(&[project("p-1", "One")])).unwrap();
    let source = JsonExportSource::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let reconciler = reconciler(store, source);
    let report = reconciler.sync_from_source().unwrap();

    assert!(!report.success);
    assert_eq!(report.errors.len(), 2);
    assert!(reconciler.store().list_projects().unwrap().is_empty());
}

#[test]
fn malformed_export_entry_is_counted_and_skipped() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let content = json!({
        "projects": [
            project("p-1", "One"),
            { "id": 42, "properties": {} },
            project("p-3", "Three"),
        ],
        "activities": [ "garbage" ],
    })
    .to_string();
    let reconciler = reconciler(
        store,
        JsonExportSource::from_json_str("workspace", &content).unwrap(),
    );

    let report = reconciler.sync_from_source().unwrap();

    assert_eq!(report.processed_count, 2);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("project `42`"));
    assert!(report.errors[1].starts_with("activity `#0`"));
    assert_eq!(reconciler.store().list_projects().unwrap().len(), 2);
}

#[test]
fn sync_outcome_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("projectpulse.db");

    {
        let conn = open_db(&db_path).unwrap();
        let store = SqliteStore::try_new(&conn).unwrap();
        let reconciler = reconciler(
            store,
            ScriptedSource::new(
                vec![vec![project("p-1", "One")]],
                vec![vec![activity("a-1", "Lost", "p-missing")]],
            ),
        );
        reconciler.sync_from_source().unwrap();
    }

    let conn = open_db(&db_path).unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let persisted = store.load_sync_state().unwrap().unwrap();
    assert!(!persisted.in_progress);
    assert_eq!(persisted.processed_count, 1);
    assert!(persisted.last_sync_at_ms.is_some());
    assert_eq!(persisted.orphaned_activities.len(), 1);
    assert_eq!(persisted.orphaned_activities[0].external_id, "a-1");

    let handle = SyncStateHandle::from_snapshot(persisted.clone());
    assert_eq!(handle.snapshot(), persisted);
}

#[test]
fn fresh_store_has_no_sync_outcome() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    assert!(store.load_sync_state().unwrap().is_none());
}

#[test]
fn connection_check_reports_source_failure() {
    let mut failing = ScriptedSource::new(vec![vec![project("p-1", "One")]], Vec::new());
    failing.fail_projects_at = Some(0);
    let err = failing.check_connection().unwrap_err();
    assert_eq!(err.entity, EntityKind::Project);
    assert!(err.message.contains("connection reset"));

    let healthy = ScriptedSource::new(vec![vec![project("p-1", "One")]], Vec::new());
    healthy.check_connection().unwrap();
    assert_eq!(healthy.request_count(EntityKind::Activity), 0);
}
