//! Live status resolution.
//!
//! Status is a pure derivation from live tmux state, recomputed on every
//! query and never cached: a tmux round-trip per query buys freedom from
//! stale-status bugs. When the registry disagrees with tmux, tmux wins.

use tracing::{debug, warn};

use crate::models::session::{SessionRecord, SessionStatus};
use crate::persistence::IndexStore;
use crate::tmux::TmuxClient;
use crate::Result;

/// Derive the live status of a tmux session name.
///
/// No live session → `Terminated`; live and attached → `Active`; live and
/// unattached → `Inactive`. Never returns `Restoring` — that state exists
/// only in the registry, owned by the restoration orchestrator.
///
/// # Errors
///
/// Returns `AppError::External` if tmux cannot be queried at all.
pub async fn resolve_status(tmux: &TmuxClient, tmux_name: &str) -> Result<SessionStatus> {
    if !tmux.session_exists(tmux_name).await? {
        return Ok(SessionStatus::Terminated);
    }

    match tmux.session_info(tmux_name).await? {
        Some(info) if info.is_attached => Ok(SessionStatus::Active),
        // The session can vanish between the two probes; absent info means
        // it is gone.
        Some(_) => Ok(SessionStatus::Inactive),
        None => Ok(SessionStatus::Terminated),
    }
}

/// Resolve a record's live status and persist a correction when the
/// registry is stale (self-heal).
///
/// A record in `Restoring` is reported as-is and never overwritten here:
/// the in-flight restoration owns that state and will settle it. Probe and
/// persistence failures degrade to the recorded status with a warning;
/// healing is best-effort.
pub async fn resolve_and_heal(
    store: &IndexStore,
    tmux: &TmuxClient,
    record: &SessionRecord,
) -> SessionStatus {
    if record.status == SessionStatus::Restoring {
        return SessionStatus::Restoring;
    }

    let live = match resolve_status(tmux, &record.tmux_name).await {
        Ok(status) => status,
        Err(err) => {
            warn!(
                session_id = %record.session_id,
                %err,
                "status probe failed; reporting recorded status"
            );
            return record.status;
        }
    };

    if live != record.status {
        match store.update_status(record.session_id, live).await {
            Ok(_) => debug!(
                session_id = %record.session_id,
                recorded = %record.status,
                live = %live,
                "healed stale session status"
            ),
            Err(err) => warn!(
                session_id = %record.session_id,
                %err,
                "failed to persist status correction"
            ),
        }
    }

    live
}
