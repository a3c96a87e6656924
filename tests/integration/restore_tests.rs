use mas_control::models::session::SessionStatus;
use mas_control::orchestrator::restore::{restore_session, RestoreOptions};
use mas_control::orchestrator::runner::ScriptRunner;
use mas_control::AppError;

use super::support::{record, uuid_1, TestWorkspace};

fn runner(ws: &TestWorkspace) -> ScriptRunner {
    ScriptRunner::from_config(&ws.config)
}

/// Script body that recreates the session in the stub's live table and
/// prints the restored name the way the production library does.
fn reviving_body(ws: &TestWorkspace) -> String {
    format!(
        "echo 'mas-11111111|4|0' >> '{}/live'\n\
         echo \"[INFO] Restored session mas-11111111\"",
        ws.stub_dir().display()
    )
}

#[tokio::test]
async fn restores_a_terminated_session() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    ws.write_restore_script(&reviving_body(&ws));
    ws.set_windows("mas-11111111", &["0|meta|1|1"]);
    ws.set_panes("mas-11111111", 0, &["0|claude"]);

    let info = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect("restore");

    assert_eq!(info.tmux_name, "mas-11111111");
    assert_eq!(info.session_id, uuid_1().to_string());
    assert!(info.attach_command.ends_with("attach-session -t mas-11111111"));
    assert_eq!(info.window_count, 1);
    assert_eq!(info.running_agents, 1);

    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    ws.write_restore_script("true");

    let err = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "deadbeef",
        RestoreOptions::default(),
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
}

#[tokio::test]
async fn script_failure_rolls_the_record_back() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    ws.write_restore_script("echo '[ERROR] tmux new-session failed' >&2\nexit 1");

    let err = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, AppError::External(_)), "got {err}");

    // The transient restoring state must not outlive the operation.
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Terminated);
}

#[tokio::test]
async fn already_exists_from_the_script_maps_to_conflict() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    ws.write_restore_script("echo 'Session already exists: mas-11111111'\nexit 2");

    let err = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Terminated);
}

#[tokio::test]
async fn live_session_without_force_is_a_conflict() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Inactive)]);
    ws.set_live(&[("mas-11111111", 4, 0)]);
    ws.write_restore_script("true");

    let err = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");

    // Nothing was killed and nothing was rewritten.
    assert!(ws.kills().is_empty());
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}

#[tokio::test]
async fn force_kills_a_live_session_first() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Active)]);
    ws.set_live(&[("mas-11111111", 4, 1)]);
    ws.write_restore_script(&reviving_body(&ws));

    let info = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions {
            start_agents: false,
            force: true,
        },
    )
    .await
    .expect("restore");

    assert_eq!(info.tmux_name, "mas-11111111");
    assert_eq!(ws.kills(), vec!["mas-11111111".to_owned()]);
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}

#[tokio::test]
async fn stale_active_record_is_healed_then_restored() {
    let ws = TestWorkspace::new();
    // Recorded active, but the process tree is gone.
    ws.seed_index(&[record(uuid_1(), SessionStatus::Active)]);
    ws.write_restore_script(&reviving_body(&ws));

    let info = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect("restore");

    assert_eq!(info.tmux_name, "mas-11111111");
    assert!(ws.kills().is_empty());
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}

#[tokio::test]
async fn in_flight_restoration_rejects_a_duplicate() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Restoring)]);
    ws.write_restore_script("true");

    let err = restore_session(
        &ws.store(),
        &ws.tmux(),
        &runner(&ws),
        &ws.config.workspace_root,
        "1111",
        RestoreOptions::default(),
    )
    .await
    .expect_err("must fail");
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");

    // The duplicate must not disturb the in-flight restoration's state.
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Restoring);
}

#[tokio::test]
async fn concurrent_submissions_let_exactly_one_through() {
    let ws = TestWorkspace::new();
    ws.seed_index(&[record(uuid_1(), SessionStatus::Terminated)]);
    // Keep the winner in flight long enough for the loser to hit the
    // restoring compare-and-set.
    ws.write_restore_script(&format!("sleep 0.3\n{}", reviving_body(&ws)));

    let store = ws.store();
    let tmux = ws.tmux();
    let script = runner(&ws);
    let root = ws.config.workspace_root.clone();

    let (first, second) = tokio::join!(
        restore_session(&store, &tmux, &script, &root, "1111", RestoreOptions::default()),
        restore_session(&store, &tmux, &script, &root, "1111", RestoreOptions::default()),
    );

    let (winner, loser) = match (first, second) {
        (Ok(info), Err(err)) | (Err(err), Ok(info)) => (info, err),
        (Ok(_), Ok(_)) => panic!("both submissions succeeded"),
        (Err(a), Err(b)) => panic!("both submissions failed: {a} / {b}"),
    };

    assert_eq!(winner.tmux_name, "mas-11111111");
    assert!(matches!(loser, AppError::Conflict(_)), "got {loser}");
    assert_eq!(ws.read_record(uuid_1()).status, SessionStatus::Inactive);
}
