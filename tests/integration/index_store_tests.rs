use std::fs;
use std::time::Duration;

use mas_control::models::session::{SessionIndex, SessionStatus, INDEX_VERSION};
use mas_control::persistence::index_store::LOCK_FILE;
use mas_control::AppError;

use super::support::{record, uuid_1, uuid_1_sibling, uuid_2, TestWorkspace};

#[tokio::test]
async fn absent_registry_reads_as_clean_empty() {
    let ws = TestWorkspace::new();
    let index = ws.store().read_index().await;
    assert_eq!(index.version, INDEX_VERSION);
    assert!(index.sessions.is_empty());
}

#[tokio::test]
async fn corrupt_registry_degrades_to_empty() {
    let ws = TestWorkspace::new();
    let dir = ws.config.sessions_dir();
    fs::create_dir_all(&dir).expect("sessions dir");
    fs::write(dir.join(".sessions.index"), "{ not json").expect("write");

    let index = ws.store().read_index().await;
    assert!(index.sessions.is_empty());
}

#[tokio::test]
async fn zero_byte_registry_degrades_to_empty() {
    let ws = TestWorkspace::new();
    let dir = ws.config.sessions_dir();
    fs::create_dir_all(&dir).expect("sessions dir");
    fs::write(dir.join(".sessions.index"), "").expect("write");

    let index = ws.store().read_index().await;
    assert!(index.sessions.is_empty());
}

#[tokio::test]
async fn update_status_commits_and_releases_the_lock() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Inactive)]);
    let store = ws.store();

    let before = ws.read_record(uuid_1()).last_updated;
    let updated = store
        .update_status(uuid_1(), SessionStatus::Active)
        .await
        .expect("update");

    assert_eq!(updated.status, SessionStatus::Active);
    assert!(updated.last_updated >= before);

    let on_disk = ws.read_record(uuid_1());
    assert_eq!(on_disk.status, SessionStatus::Active);
    assert!(!ws.config.sessions_dir().join(LOCK_FILE).exists());
}

#[tokio::test]
async fn update_status_unknown_id_is_not_found() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Inactive)]);

    let err = ws
        .store()
        .update_status(uuid_2(), SessionStatus::Active)
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
}

#[tokio::test]
async fn update_status_without_registry_is_not_found() {
    let ws = TestWorkspace::new();
    let err = ws
        .store()
        .update_status(uuid_1(), SessionStatus::Active)
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
}

#[tokio::test]
async fn begin_restore_first_submission_wins() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    let store = ws.store();

    let first = store.begin_restore(uuid_1()).await.expect("first wins");
    assert_eq!(first.status, SessionStatus::Restoring);

    let second = store.begin_restore(uuid_1()).await.expect_err("must lose");
    assert!(matches!(second, AppError::Conflict(_)), "got {second}");

    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Restoring);
}

#[tokio::test]
async fn held_lock_times_out_as_transient() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Inactive)]);
    fs::write(ws.config.sessions_dir().join(LOCK_FILE), "").expect("sentinel");

    let store = ws
        .store()
        .with_lock_params(Duration::from_millis(10), 3);
    let err = store
        .update_status(uuid_1(), SessionStatus::Active)
        .await
        .expect_err("must time out");
    assert!(matches!(err, AppError::Transient(_)), "got {err}");

    // The registry was never touched.
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}

#[tokio::test]
async fn blocked_writer_proceeds_once_the_lock_frees() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Inactive)]);
    let lock_path = ws.config.sessions_dir().join(LOCK_FILE);
    fs::write(&lock_path, "").expect("sentinel");

    let holder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        fs::remove_file(&lock_path).expect("release sentinel");
    });

    let store = ws
        .store()
        .with_lock_params(Duration::from_millis(10), 50);
    let updated = store
        .update_status(uuid_1(), SessionStatus::Active)
        .await
        .expect("acquire after release");
    assert_eq!(updated.status, SessionStatus::Active);

    holder.await.expect("holder task");
}

#[tokio::test]
async fn concurrent_updates_all_land_without_corruption() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[
        record(uuid_1(), SessionStatus::Inactive),
        record(uuid_2(), SessionStatus::Inactive),
    ]);

    let mut tasks = Vec::new();
    for round in 0..4_u32 {
        for id in [uuid_1(), uuid_2()] {
            let store = ws.store();
            let status = if round % 2 == 0 {
                SessionStatus::Active
            } else {
                SessionStatus::Inactive
            };
            tasks.push(tokio::spawn(async move {
                store.update_status(id, status).await
            }));
        }
    }
    for task in tasks {
        task.await.expect("join").expect("update");
    }

    // Every interleaving must leave a parsable registry with both records.
    let raw = fs::read_to_string(ws.config.sessions_dir().join(".sessions.index"))
        .expect("read index");
    let index: SessionIndex = serde_json::from_str(&raw).expect("clean parse");
    assert_eq!(index.sessions.len(), 2);
    assert!(index.find(uuid_1()).is_some());
    assert!(index.find(uuid_2()).is_some());
}

#[tokio::test]
async fn resolve_accepts_full_ids_and_unique_prefixes() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[
        record(uuid_1(), SessionStatus::Active),
        record(uuid_1_sibling(), SessionStatus::Inactive),
        record(uuid_2(), SessionStatus::Terminated),
    ]);
    let store = ws.store();

    let exact = store
        .resolve_session_id(&uuid_1().to_string())
        .await
        .expect("exact");
    assert_eq!(exact.session_id, uuid_1());

    // Unique one past the shared first eight digits.
    let by_prefix = store
        .resolve_session_id("11111111-a")
        .await
        .expect("prefix");
    assert_eq!(by_prefix.session_id, uuid_1_sibling());

    let short = store.resolve_session_id("2222").await.expect("prefix");
    assert_eq!(short.session_id, uuid_2());
}

#[tokio::test]
async fn resolve_rejects_ambiguous_and_unknown_ids() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[
        record(uuid_1(), SessionStatus::Active),
        record(uuid_1_sibling(), SessionStatus::Inactive),
    ]);
    let store = ws.store();

    let ambiguous = store.resolve_session_id("1111").await.expect_err("shared");
    assert!(matches!(ambiguous, AppError::AmbiguousId(_)), "got {ambiguous}");

    let unknown = store.resolve_session_id("ffff").await.expect_err("unknown");
    assert!(matches!(unknown, AppError::NotFound(_)), "got {unknown}");

    let empty = store.resolve_session_id("  ").await.expect_err("empty");
    assert!(matches!(empty, AppError::NotFound(_)), "got {empty}");
}
