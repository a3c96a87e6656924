//! Per-session metadata file reader.
//!
//! Each session owns `<sessions_dir>/<sessionId>/.session`, a line-oriented
//! `KEY=VALUE` file written once at creation. It is never contended across
//! sessions, so no locking is involved here.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::session::SessionMetadata;
use crate::{AppError, Result};

/// Metadata file name inside the per-session directory.
pub const METADATA_FILE: &str = ".session";

/// Read the metadata file for one session.
///
/// An absent file means the session is unknown to this subsystem,
/// independent of whether it appears in the registry; that case is
/// `Ok(None)`, not an error.
///
/// # Errors
///
/// Returns `AppError::Metadata` if the file exists but cannot be read.
pub async fn read_metadata(
    sessions_dir: &Path,
    session_id: Uuid,
) -> Result<Option<SessionMetadata>> {
    let path = metadata_path(sessions_dir, session_id);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(AppError::Metadata(format!(
                "failed to read {}: {err}",
                path.display()
            )))
        }
    };

    Ok(Some(parse_metadata(&content)))
}

/// Path of the metadata file for a session.
#[must_use]
pub fn metadata_path(sessions_dir: &Path, session_id: Uuid) -> PathBuf {
    sessions_dir.join(session_id.to_string()).join(METADATA_FILE)
}

/// Parse `KEY=VALUE` lines. Blank lines and lines without `=` are skipped;
/// values may themselves contain `=`. Unrecognized keys land in `extra`.
#[must_use]
pub fn parse_metadata(content: &str) -> SessionMetadata {
    let mut metadata = SessionMetadata::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.trim().to_ascii_lowercase().as_str() {
            "tmux_session" => metadata.tmux_session = Some(value.to_owned()),
            "session_dir" => metadata.session_dir = Some(PathBuf::from(value)),
            "created_at" => metadata.created_at = Some(value.to_owned()),
            "status" => metadata.status = Some(value.to_owned()),
            other => {
                metadata.extra.insert(other.to_owned(), value.to_owned());
            }
        }
    }

    metadata
}
