//! Session model types and naming helpers.
//!
//! The serde attributes on [`SessionIndex`] and [`SessionRecord`] pin the
//! on-disk JSON field names (`sessionId`, `tmuxSession`, ...) — the registry
//! file is a boundary format shared with the shell tooling that creates
//! sessions, so these must not drift.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registry format version written by the session-creation tooling.
pub const INDEX_VERSION: &str = "1.0";

/// Lifecycle status for a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Live tmux session with a client attached.
    Active,
    /// Live tmux session, no client attached.
    Inactive,
    /// No live tmux process tree.
    Terminated,
    /// Transient lock state: a restoration is in flight. Must never
    /// persist past the restore operation that set it.
    Restoring,
}

impl SessionStatus {
    /// Lowercase wire name, matching the on-disk JSON strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Terminated => "terminated",
            Self::Restoring => "restoring",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "terminated" => Ok(Self::Terminated),
            "restoring" => Ok(Self::Restoring),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One entry per session in the registry. Only `status` and `last_updated`
/// mutate after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Unique session identifier; primary key, immutable.
    pub session_id: Uuid,
    /// Derived tmux session name (`mas-` + first 8 hex of the id).
    #[serde(rename = "tmuxSession")]
    pub tmux_name: String,
    /// Working directory the session was created in.
    pub working_dir: PathBuf,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-known lifecycle status.
    pub status: SessionStatus,
    /// Timestamp of the last status write.
    pub last_updated: DateTime<Utc>,
}

/// The whole registry file: `<workspaceRoot>/sessions/.sessions.index`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndex {
    /// Registry format version.
    pub version: String,
    /// All known sessions, in creation order.
    pub sessions: Vec<SessionRecord>,
    /// Timestamp of the last registry write.
    pub last_updated: DateTime<Utc>,
}

impl Default for SessionIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.into(),
            sessions: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

impl SessionIndex {
    /// Find a record by its full session id.
    #[must_use]
    pub fn find(&self, session_id: Uuid) -> Option<&SessionRecord> {
        self.sessions.iter().find(|r| r.session_id == session_id)
    }

    /// Mutable lookup by full session id.
    pub fn find_mut(&mut self, session_id: Uuid) -> Option<&mut SessionRecord> {
        self.sessions.iter_mut().find(|r| r.session_id == session_id)
    }
}

/// Per-session metadata parsed from the line-oriented
/// `<workspaceRoot>/sessions/<sessionId>/.session` file.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// tmux session name recorded at creation.
    pub tmux_session: Option<String>,
    /// Session state directory.
    pub session_dir: Option<PathBuf>,
    /// Creation time as written by the creation tooling.
    pub created_at: Option<String>,
    /// Mutable status field (informational; the registry is authoritative).
    pub status: Option<String>,
    /// Any keys this subsystem does not interpret.
    pub extra: BTreeMap<String, String>,
}

/// Live status of one agent pane. Derived on every query, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Two-digit agent id (`00`, `10`, ...).
    pub agent_id: &'static str,
    /// Human-readable agent name.
    pub name: &'static str,
    /// Whether the pane's foreground command looks like a running agent.
    pub running: bool,
    /// Window name the agent lives in.
    pub window: &'static str,
    /// Pane index within the window.
    pub pane: u32,
}

/// One tmux window of a session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    /// Window index.
    pub index: u32,
    /// Window name.
    pub name: String,
    /// Number of panes in the window.
    pub pane_count: u32,
    /// Whether this is the active window.
    pub active: bool,
}

/// List-row view of a session with its live-resolved status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Full session id.
    pub session_id: Uuid,
    /// tmux session name.
    #[serde(rename = "tmuxSession")]
    pub tmux_name: String,
    /// Status resolved against live tmux state at query time.
    pub status: SessionStatus,
    /// Working directory.
    pub working_dir: PathBuf,
    /// Creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Number of agents whose pane currently runs an agent process.
    pub agent_count: usize,
}

/// Full session view: summary plus agents, windows, and metadata.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    /// Summary fields.
    #[serde(flatten)]
    pub summary: SessionSummary,
    /// Per-agent live status.
    pub agents: Vec<AgentDescriptor>,
    /// tmux windows of the session.
    pub windows: Vec<WindowInfo>,
    /// Per-session metadata file, if present.
    pub metadata: Option<SessionMetadata>,
}

/// Attach descriptor for a live session. Produced without state mutation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Session id as resolved (full id when known, caller's form otherwise).
    pub session_id: String,
    /// tmux session name to attach to.
    #[serde(rename = "tmuxSession")]
    pub tmux_name: String,
    /// Shell command a client can run to attach.
    pub attach_command: String,
    /// Window count at descriptor-build time (informational).
    pub window_count: usize,
    /// Running-agent count at descriptor-build time (informational).
    pub running_agents: usize,
    /// Descriptor build timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Derive the tmux session name from a session id: prefix plus the first
/// eight hex digits of the UUID.
#[must_use]
pub fn derive_tmux_name(prefix: &str, session_id: Uuid) -> String {
    let full = session_id.as_simple().to_string();
    format!("{prefix}{}", &full[..8])
}
