//! Session restoration state machine.
//!
//! Per session: `terminated → restoring → inactive` on success, with
//! `restoring → terminated` rollback on failure. At most one restoration
//! is in flight per session; a duplicate submission observes `restoring`
//! and is rejected with a Conflict.

use std::path::Path;

use chrono::Utc;
use tracing::{info, info_span, warn};

use crate::models::session::{ConnectionInfo, SessionStatus};
use crate::orchestrator::runner::{RestoreRequest, RestoreRunner};
use crate::persistence::IndexStore;
use crate::tmux::TmuxClient;
use crate::{AppError, Result};

/// Caller-supplied restore options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Ask the restore procedure to also start the agent processes.
    pub start_agents: bool,
    /// Kill a still-live session before restoring instead of rejecting.
    pub force: bool,
}

/// Revive a terminated session, preserving its identity and working
/// directory.
///
/// The persisted `Restoring` transition is the serialization point: it is
/// a compare-and-set under the registry lock, so of two concurrent calls
/// for the same session exactly one reaches the external procedure and the
/// other fails with Conflict. Any failure after that point rolls the
/// record back to `Terminated` (best-effort; a rollback failure is logged,
/// not re-raised) and propagates the original error.
///
/// # Errors
///
/// Returns `AppError::NotFound`/`AmbiguousId` for unresolvable ids,
/// `AppError::Conflict` when the session is still running (without
/// `force`) or a restoration is already in flight, `AppError::External`
/// when the restore procedure fails, and `AppError::Transient` on registry
/// lock or I/O failures.
pub async fn restore_session<R: RestoreRunner>(
    store: &IndexStore,
    tmux: &TmuxClient,
    runner: &R,
    workspace_root: &Path,
    candidate: &str,
    opts: RestoreOptions,
) -> Result<ConnectionInfo> {
    let span = info_span!("restore_session", candidate, force = opts.force);
    let _guard = span.enter();

    // Step 1: resolve the (possibly abbreviated) id against the registry.
    let record = store.resolve_session_id(candidate).await?;
    let session_id = record.session_id;

    // Step 2: compare recorded status against live tmux existence.
    if record.status == SessionStatus::Restoring {
        return Err(AppError::Conflict(
            "restoration already in progress".into(),
        ));
    }

    let live = tmux.session_exists(&record.tmux_name).await?;
    if record.status != SessionStatus::Terminated {
        if !live {
            // The process tree died without the registry being told.
            store
                .update_status(session_id, SessionStatus::Terminated)
                .await?;
            info!(session_id = %session_id, "healed stale status before restore");
        } else if opts.force {
            // Known race boundary: this check-then-kill is not atomic with
            // respect to another force-restore of the same session arriving
            // between the two; the Restoring guard below is the defense for
            // the common duplicate-restore case, not for that interleaving.
            if let Err(err) = tmux.kill_session(&record.tmux_name, true).await {
                warn!(session_id = %session_id, %err, "force kill failed; proceeding");
            }
        } else {
            return Err(AppError::Conflict(format!(
                "session {} is still running",
                record.tmux_name
            )));
        }
    }

    // Step 3: serialization point.
    store.begin_restore(session_id).await?;

    // Steps 4-5, with step 6 rollback on any failure past this point.
    let request = RestoreRequest {
        session_id,
        start_agents: opts.start_agents,
        workspace_root: workspace_root.to_path_buf(),
    };

    let settled = async {
        let outcome = runner.run(&request).await?;
        store
            .update_status(session_id, SessionStatus::Inactive)
            .await?;
        Ok::<_, AppError>(outcome)
    }
    .await;

    let outcome = match settled {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Err(rollback_err) = store
                .update_status(session_id, SessionStatus::Terminated)
                .await
            {
                warn!(
                    session_id = %session_id,
                    %rollback_err,
                    "rollback to terminated failed; record may be stuck in restoring"
                );
            }
            return Err(err);
        }
    };

    info!(
        session_id = %session_id,
        tmux_session = outcome.tmux_name,
        agents_started = opts.start_agents,
        "session restored"
    );

    // Nominal counts for display only; the session was created moments ago.
    let windows = tmux.list_windows(&outcome.tmux_name).await;
    let agents = tmux.agent_statuses(&outcome.tmux_name).await;

    Ok(ConnectionInfo {
        session_id: session_id.to_string(),
        attach_command: tmux.attach_command(&outcome.tmux_name),
        tmux_name: outcome.tmux_name,
        window_count: windows.len(),
        running_agents: agents.iter().filter(|a| a.running).count(),
        timestamp: Utc::now(),
    })
}
