use projectpulse_core::db::open_db_in_memory;
use projectpulse_core::repo::{
    ActivityListQuery, ActivityRepository, ProjectRepository, UserRepository,
};
use projectpulse_core::{
    Activity, ActivityStatus, Project, ProjectStatus, RepoError, RiskLevel, SqliteStore, User,
    UserRole,
};

const NOW: i64 = 1_700_000_000_000;

#[test]
fn project_round_trips_every_field() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let owner = User::new("Ana", "ana@example.com", UserRole::Coordinator, NOW);
    let member = User::new("Beto", "beto@example.com", UserRole::Member, NOW);
    store.create_user(&owner).unwrap();
    store.create_user(&member).unwrap();

    let mut project = Project::new("Irrigation pilot", NOW);
    project.description = "Drip lines for the north plots".to_string();
    project.status = ProjectStatus::InProgress;
    project.start_date = Some(NOW);
    project.end_date = Some(NOW + 86_400_000);
    project.budget = Some(50_000.0);
    project.budget_executed = Some(12_500.5);
    project.owner_id = Some(owner.id);
    project.team_ids.insert(owner.id);
    project.team_ids.insert(member.id);
    project.external_id = Some("ext-p-1".to_string());
    project.viability_score = Some(72);
    project.risk_level = Some(RiskLevel::Medium);
    project.recommendations = vec!["Keep monitoring".to_string()];

    store.create_project(&project).unwrap();

    let loaded = store.get_project(project.id).unwrap().unwrap();
    assert_eq!(loaded, project);

    let by_external = store.get_project_by_external_id("ext-p-1").unwrap().unwrap();
    assert_eq!(by_external.id, project.id);
    assert!(store.get_project_by_external_id("missing").unwrap().is_none());
}

#[test]
fn update_project_persists_changes_and_rejects_unknown_ids() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let mut project = Project::new("Clinic renovation", NOW);
    store.create_project(&project).unwrap();

    project.status = ProjectStatus::Completed;
    project.touch(NOW + 10);
    store.update_project(&project).unwrap();

    let loaded = store.get_project(project.id).unwrap().unwrap();
    assert_eq!(loaded.status, ProjectStatus::Completed);
    assert_eq!(loaded.updated_at, NOW + 10);

    let ghost = Project::new("Ghost", NOW);
    let err = store.update_project(&ghost).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "project", .. }));
}

#[test]
fn writes_validate_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let mut project = Project::new("  ", NOW);
    assert!(matches!(
        store.create_project(&project),
        Err(RepoError::Validation(_))
    ));

    project.name = "Budgeted".to_string();
    project.budget = Some(-1.0);
    assert!(matches!(
        store.create_project(&project),
        Err(RepoError::Validation(_))
    ));
    assert!(store.list_projects().unwrap().is_empty());
}

#[test]
fn duplicate_external_id_is_reported_as_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let mut first = Project::new("First", NOW);
    first.external_id = Some("ext-dup".to_string());
    store.create_project(&first).unwrap();

    let mut second = Project::new("Second", NOW);
    second.external_id = Some("ext-dup".to_string());
    match store.create_project(&second) {
        Err(RepoError::Duplicate { entity, key }) => {
            assert_eq!(entity, "project");
            assert_eq!(key, "ext-dup");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // Projects without external ids never collide.
    store.create_project(&Project::new("Local A", NOW)).unwrap();
    store.create_project(&Project::new("Local B", NOW)).unwrap();
    assert_eq!(store.list_projects().unwrap().len(), 3);
}

#[test]
fn user_emails_are_unique_and_lookups_are_case_insensitive() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let user = User::new("Carla", "  Carla@Example.COM ", UserRole::Member, NOW);
    store.create_user(&user).unwrap();

    let found = store
        .get_user_by_email("CARLA@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.email, "carla@example.com");

    let clash = User::new("Carla Two", "carla@example.com", UserRole::Authority, NOW);
    assert!(matches!(
        store.create_user(&clash),
        Err(RepoError::Duplicate { entity: "user", .. })
    ));

    let invalid = User::new("Nobody", "not-an-email", UserRole::Member, NOW);
    assert!(matches!(
        store.create_user(&invalid),
        Err(RepoError::Validation(_))
    ));
}

#[test]
fn activities_filter_by_project_and_assignee() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let user = User::new("Dario", "dario@example.com", UserRole::Member, NOW);
    store.create_user(&user).unwrap();
    let alpha = Project::new("Alpha", NOW);
    let beta = Project::new("Beta", NOW);
    store.create_project(&alpha).unwrap();
    store.create_project(&beta).unwrap();

    let mut survey = Activity::new(alpha.id, "Survey", 16.0, NOW);
    survey.assignee_id = Some(user.id);
    survey.status = ActivityStatus::InProgress;
    let report = Activity::new(alpha.id, "Report", 8.0, NOW + 1);
    let mut install = Activity::new(beta.id, "Install", 40.0, NOW + 2);
    install.assignee_id = Some(user.id);
    for activity in [&survey, &report, &install] {
        store.create_activity(activity).unwrap();
    }

    let alpha_items = store
        .list_activities(&ActivityListQuery::for_project(alpha.id))
        .unwrap();
    assert_eq!(
        alpha_items.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["Survey", "Report"]
    );

    let assigned = store
        .list_activities(&ActivityListQuery {
            assignee_id: Some(user.id),
            ..ActivityListQuery::default()
        })
        .unwrap();
    assert_eq!(assigned.len(), 2);

    let all = store.list_activities(&ActivityListQuery::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(store.get_activity(survey.id).unwrap().unwrap(), survey);
}

#[test]
fn activity_requires_existing_project() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let orphan = Activity::new(uuid::Uuid::new_v4(), "Floating", 4.0, NOW);
    assert!(store.create_activity(&orphan).is_err());
}

#[test]
fn deleting_project_cascades_to_activities() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let project = Project::new("Short lived", NOW);
    store.create_project(&project).unwrap();
    let mut task = Activity::new(project.id, "Kickoff", 2.0, NOW);
    task.external_id = Some("ext-a-1".to_string());
    store.create_activity(&task).unwrap();

    store.delete_project(project.id).unwrap();

    assert!(store.get_activity(task.id).unwrap().is_none());
    assert!(store.get_activity_by_external_id("ext-a-1").unwrap().is_none());
    assert!(matches!(
        store.delete_project(project.id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn deleting_user_clears_assignments() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let user = User::new("Elena", "elena@example.com", UserRole::Member, NOW);
    store.create_user(&user).unwrap();
    let project = Project::new("Assigned", NOW);
    store.create_project(&project).unwrap();
    let mut task = Activity::new(project.id, "Wiring", 6.0, NOW);
    task.assignee_id = Some(user.id);
    store.create_activity(&task).unwrap();

    conn.execute("DELETE FROM users WHERE uuid = ?1;", [user.id.to_string()])
        .unwrap();

    let loaded = store.get_activity(task.id).unwrap().unwrap();
    assert_eq!(loaded.assignee_id, None);
}
