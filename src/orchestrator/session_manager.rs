//! Caller-facing session operations: list, detail, connect, stop.
//!
//! Every operation takes the store and tmux client by reference; there is
//! no module-level state. Restoration lives in [`crate::orchestrator::restore`].

use chrono::Utc;
use tracing::{info, info_span};

use crate::models::session::{
    ConnectionInfo, SessionDetail, SessionRecord, SessionStatus, SessionSummary,
};
use crate::orchestrator::status::resolve_and_heal;
use crate::persistence::{metadata, IndexStore};
use crate::tmux::TmuxClient;
use crate::{AppError, Result};

/// List all known sessions with live-resolved status.
///
/// Each record's status is re-derived from tmux at query time (stale
/// registry entries are healed as a side effect); the filter applies to
/// the resolved status, not the recorded one.
pub async fn list_sessions(
    store: &IndexStore,
    tmux: &TmuxClient,
    filter: Option<SessionStatus>,
) -> Vec<SessionSummary> {
    let index = store.read_index().await;

    let mut summaries = Vec::with_capacity(index.sessions.len());
    for record in &index.sessions {
        let status = resolve_and_heal(store, tmux, record).await;

        // Skip the pane probes for dead sessions; every agent is stopped.
        let agent_count = if status == SessionStatus::Terminated {
            0
        } else {
            tmux.agent_statuses(&record.tmux_name)
                .await
                .iter()
                .filter(|a| a.running)
                .count()
        };

        summaries.push(SessionSummary {
            session_id: record.session_id,
            tmux_name: record.tmux_name.clone(),
            status,
            working_dir: record.working_dir.clone(),
            started_at: record.created_at,
            agent_count,
        });
    }

    if let Some(wanted) = filter {
        summaries.retain(|s| s.status == wanted);
    }
    summaries
}

/// Full view of one session: live status, agents, windows, and metadata.
///
/// # Errors
///
/// Returns `AppError::NotFound`/`AmbiguousId` for unresolvable ids and
/// `AppError::Metadata` if the metadata file exists but is unreadable.
pub async fn get_session_detail(
    store: &IndexStore,
    tmux: &TmuxClient,
    candidate: &str,
) -> Result<SessionDetail> {
    let record = store.resolve_session_id(candidate).await?;

    let status = resolve_and_heal(store, tmux, &record).await;
    let windows = tmux.list_windows(&record.tmux_name).await;
    let agents = tmux.agent_statuses(&record.tmux_name).await;
    let session_metadata = metadata::read_metadata(store.sessions_dir(), record.session_id).await?;

    let running = agents.iter().filter(|a| a.running).count();
    Ok(SessionDetail {
        summary: SessionSummary {
            session_id: record.session_id,
            tmux_name: record.tmux_name,
            status,
            working_dir: record.working_dir,
            started_at: record.created_at,
            agent_count: running,
        },
        agents,
        windows,
        metadata: session_metadata,
    })
}

/// Build an attach descriptor for an already-live session.
///
/// Stateless: resolves the abbreviated id by prefix match against the
/// currently live tmux session names and mutates nothing. Window and
/// agent counts are informational only.
///
/// # Errors
///
/// Returns `AppError::NotFound` when no live session matches and
/// `AppError::AmbiguousId` when more than one does.
pub async fn connect(tmux: &TmuxClient, candidate: &str) -> Result<ConnectionInfo> {
    let span = info_span!("connect_session", candidate);
    let _guard = span.enter();

    let tmux_name = resolve_live_name(tmux, candidate).await?;

    let windows = tmux.list_windows(&tmux_name).await;
    let agents = tmux.agent_statuses(&tmux_name).await;

    Ok(ConnectionInfo {
        session_id: candidate.to_owned(),
        attach_command: tmux.attach_command(&tmux_name),
        tmux_name,
        window_count: windows.len(),
        running_agents: agents.iter().filter(|a| a.running).count(),
        timestamp: Utc::now(),
    })
}

/// Stop a session's tmux process tree and record the termination.
///
/// Killing a session that is already gone is not an error; the registry
/// write still happens so a record that missed its termination gets
/// corrected.
///
/// # Errors
///
/// Returns `AppError::NotFound`/`AmbiguousId` for unresolvable ids,
/// `AppError::External` if the kill fails, and `AppError::Transient` if
/// the registry write fails.
pub async fn stop(
    store: &IndexStore,
    tmux: &TmuxClient,
    candidate: &str,
    force: bool,
) -> Result<SessionRecord> {
    let span = info_span!("stop_session", candidate, force);
    let _guard = span.enter();

    let record = store.resolve_session_id(candidate).await?;
    tmux.kill_session(&record.tmux_name, force).await?;

    let updated = store
        .update_status(record.session_id, SessionStatus::Terminated)
        .await?;
    info!(session_id = %updated.session_id, "session stopped");
    Ok(updated)
}

/// Resolve an abbreviated id to a live tmux session name by prefix match.
async fn resolve_live_name(tmux: &TmuxClient, candidate: &str) -> Result<String> {
    let prefix = tmux.session_prefix().to_owned();
    let needle = candidate
        .strip_prefix(&prefix)
        .unwrap_or(candidate)
        .replace('-', "")
        .to_ascii_lowercase();
    if needle.is_empty() {
        return Err(AppError::NotFound("empty session id".into()));
    }

    let live = tmux.list_sessions().await?;
    let matches: Vec<&String> = live
        .iter()
        .filter(|name| {
            let short = name.strip_prefix(&prefix).unwrap_or(name);
            short.starts_with(&needle) || needle.starts_with(short)
        })
        .collect();

    match matches.as_slice() {
        [] => Err(AppError::NotFound(format!(
            "no live session matches '{candidate}'"
        ))),
        [name] => Ok((*name).clone()),
        many => Err(AppError::AmbiguousId(format!(
            "'{candidate}' matches {} live sessions",
            many.len()
        ))),
    }
}
