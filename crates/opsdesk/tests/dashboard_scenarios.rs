//! End-to-end dashboard scenarios against real stores.

use std::path::Path;
use std::sync::Arc;

use opsdesk::config::{Credential, StoreBackend};
use opsdesk::policy::hash_password;
use opsdesk::store::{FileStore, SqliteStore};
use opsdesk::{
    AssignmentStatus, BackendStore, Config, Dashboard, Error, Record, Role, Session,
};

fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.editors = vec![Credential::new("A", hash_password("editor-pw").unwrap())];
    config.auth.publishers = vec![Credential::new("P", hash_password("publish-pw").unwrap())];
    config.auth.viewer_password_hash = Some(hash_password("view-pw").unwrap());
    config
}

fn file_dashboard(dir: &Path, config: &Config) -> Dashboard {
    let store: Arc<dyn BackendStore> = Arc::new(FileStore::open(dir).unwrap());
    Dashboard::new(store, config).unwrap()
}

async fn login(dashboard: &Dashboard, user: &str, password: &str) -> Session {
    let mut session = Session::new();
    dashboard
        .authenticate(&mut session, user, password)
        .await
        .unwrap();
    session
}

fn review_pr() -> Record {
    Record::new()
        .with("task", "Review PR")
        .with("assigned_to", "A")
        .with("priority", 1_i64)
        .with("done", false)
}

fn done_flag(record: &Record) -> Option<bool> {
    record.get("done").and_then(|v| v.as_bool())
}

#[tokio::test]
async fn test_review_pr_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let dashboard = file_dashboard(dir.path(), &config);

    let a = login(&dashboard, "A", "editor-pw").await;
    let b = login(&dashboard, "B", "view-pw").await;
    assert_eq!(a.role(), Role::Editor);
    assert_eq!(b.role(), Role::Viewer);

    dashboard
        .create_record(&a, "assignments", review_pr())
        .await
        .unwrap();

    // B sees it pending and may not toggle it
    let seen = dashboard.get_records(&b, "assignments").await.unwrap();
    assert_eq!(seen, vec![review_pr()]);
    let views = dashboard.assignment_views(&b).await.unwrap();
    assert!(!views[0].can_toggle);
    let err = dashboard.toggle_assignment_done(&b, 0).await.unwrap_err();
    assert!(matches!(err, Error::NotOwner { .. }));
    assert_eq!(
        done_flag(&dashboard.get_records(&b, "assignments").await.unwrap()[0]),
        Some(false)
    );

    let toggled = dashboard.toggle_assignment_done(&a, 0).await.unwrap();
    assert_eq!(toggled.status(), AssignmentStatus::Done);

    for session in [&a, &b] {
        let records = dashboard.get_records(session, "assignments").await.unwrap();
        assert_eq!(done_flag(&records[0]), Some(true));
    }

    // a fresh process over the same directory sees the same state
    let reopened = file_dashboard(dir.path(), &config);
    let c = login(&reopened, "C", "view-pw").await;
    let records = reopened.get_records(&c, "assignments").await.unwrap();
    assert_eq!(done_flag(&records[0]), Some(true));
}

#[tokio::test]
async fn test_double_toggle_restores_store() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = file_dashboard(dir.path(), &test_config());
    let a = login(&dashboard, "A", "editor-pw").await;
    dashboard
        .create_record(&a, "assignments", review_pr())
        .await
        .unwrap();

    dashboard.toggle_assignment_done(&a, 0).await.unwrap();
    dashboard.toggle_assignment_done(&a, 0).await.unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("assignments.json")).unwrap();
    let stored: Vec<Record> = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(stored, vec![review_pr()]);
}

#[tokio::test]
async fn test_file_layout_and_last_access() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = file_dashboard(dir.path(), &test_config());
    let before = chrono::Utc::now();

    let a = login(&dashboard, "A", "editor-pw").await;
    dashboard
        .create_record(
            &a,
            "ongoing",
            Record::new().with("title", "Call vendor").with("status", "open"),
        )
        .await
        .unwrap();

    let last = dashboard.last_access().await.unwrap();
    assert_eq!(last.user, "A");
    assert!(last.time >= before - chrono::Duration::seconds(1));

    let ongoing = std::fs::read_to_string(dir.path().join("ongoing.json")).unwrap();
    assert!(ongoing.contains("\n    {\n        \"title\": \"Call vendor\""));
    assert!(dir.path().join("last_access.json").exists());
}

#[tokio::test]
async fn test_failed_login_leaves_last_access() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = file_dashboard(dir.path(), &test_config());
    login(&dashboard, "P", "publish-pw").await;
    let recorded = dashboard.last_access().await;

    let mut session = Session::new();
    let err = dashboard
        .authenticate(&mut session, "A", "publish-pw")
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
    assert!(!session.is_authenticated());
    assert_eq!(dashboard.last_access().await, recorded);
}

#[tokio::test]
async fn test_delete_shifts_positions() {
    let dir = tempfile::tempdir().unwrap();
    let dashboard = file_dashboard(dir.path(), &test_config());
    let a = login(&dashboard, "A", "editor-pw").await;

    for idea in ["one", "two", "three"] {
        dashboard
            .create_record(&a, "ideas", Record::new().with("idea", idea))
            .await
            .unwrap();
    }
    dashboard.delete_record(&a, "ideas", 1).await.unwrap();

    let ideas = dashboard.get_records(&a, "ideas").await.unwrap();
    assert_eq!(ideas.len(), 2);
    assert_eq!(ideas[1].get_str("idea"), Some("three"));

    let err = dashboard.delete_record(&a, "ideas", 2).await.unwrap_err();
    assert!(matches!(err, Error::RecordNotFound { .. }));
}

#[tokio::test]
async fn test_corrupt_file_reads_empty_but_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bugs.json"), "{ not json").unwrap();
    let dashboard = file_dashboard(dir.path(), &test_config());
    let a = login(&dashboard, "A", "editor-pw").await;

    assert!(dashboard.get_records(&a, "bugs").await.unwrap().is_empty());
    let err = dashboard
        .create_record(&a, "bugs", Record::new().with("issue", "Crash"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CollectionUnreadable { .. }));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("bugs.json")).unwrap(),
        "{ not json"
    );
}

#[tokio::test]
async fn test_sqlite_backend_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.store.backend = StoreBackend::Sqlite;
    config.store.database_path = Some(dir.path().join("ops.db"));

    let dashboard = Dashboard::open(&config).unwrap();
    let p = login(&dashboard, "P", "publish-pw").await;
    dashboard
        .create_record(&p, "messages", Record::new().with("message", "Welcome"))
        .await
        .unwrap();
    drop(dashboard);

    let store = SqliteStore::open(dir.path().join("ops.db")).unwrap();
    let messages = store.read("messages").await.into_records();
    assert_eq!(messages, vec![Record::new().with("message", "Welcome")]);
    assert_eq!(
        store.read("last_access").await.into_records()[0].get_str("user"),
        Some("P")
    );
}
