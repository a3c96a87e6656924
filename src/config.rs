//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_tmux_bin() -> PathBuf {
    PathBuf::from("tmux")
}

fn default_session_prefix() -> String {
    "mas-".into()
}

fn default_command_timeout_seconds() -> u64 {
    5
}

fn default_restore_timeout_seconds() -> u64 {
    10
}

fn default_agent_probe_timeout_seconds() -> u64 {
    1
}

/// Global configuration parsed from `config.toml`.
///
/// Only `workspace_root` is required; everything else carries the defaults
/// the original deployment used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Workspace root holding the `sessions/` state directory.
    pub workspace_root: PathBuf,
    /// tmux binary to invoke (absolute path or `$PATH` name).
    #[serde(default = "default_tmux_bin")]
    pub tmux_bin: PathBuf,
    /// Optional tmux socket path (`tmux -S`).
    #[serde(default)]
    pub tmux_socket: Option<PathBuf>,
    /// Shell library defining `restore_session`; defaults to
    /// `<workspace_root>/lib/session-restore.sh`.
    #[serde(default)]
    pub restore_script: Option<PathBuf>,
    /// Naming-convention prefix for session names derived from session ids.
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
    /// Wall-clock timeout for individual tmux commands.
    #[serde(default = "default_command_timeout_seconds")]
    pub command_timeout_seconds: u64,
    /// Wall-clock timeout for the external restore procedure.
    #[serde(default = "default_restore_timeout_seconds")]
    pub restore_timeout_seconds: u64,
    /// Per-agent pane introspection timeout.
    #[serde(default = "default_agent_probe_timeout_seconds")]
    pub agent_probe_timeout_seconds: u64,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration with defaults for everything except the
    /// workspace root. Used by the CLI when no config file is given.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the workspace root does not exist.
    pub fn with_workspace_root(workspace_root: PathBuf) -> Result<Self> {
        let mut config = Self {
            workspace_root,
            tmux_bin: default_tmux_bin(),
            tmux_socket: None,
            restore_script: None,
            session_prefix: default_session_prefix(),
            command_timeout_seconds: default_command_timeout_seconds(),
            restore_timeout_seconds: default_restore_timeout_seconds(),
            agent_probe_timeout_seconds: default_agent_probe_timeout_seconds(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Directory holding the session registry and per-session state.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.workspace_root.join("sessions")
    }

    /// Resolved path to the restore shell library.
    #[must_use]
    pub fn restore_script(&self) -> PathBuf {
        self.restore_script
            .clone()
            .unwrap_or_else(|| self.workspace_root.join("lib").join("session-restore.sh"))
    }

    /// Timeout applied to individual tmux commands.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    /// Timeout applied to the external restore procedure.
    #[must_use]
    pub fn restore_timeout(&self) -> Duration {
        Duration::from_secs(self.restore_timeout_seconds)
    }

    /// Timeout applied to each per-agent pane probe.
    #[must_use]
    pub fn agent_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_probe_timeout_seconds)
    }

    fn validate(&mut self) -> Result<()> {
        if self.session_prefix.is_empty() {
            return Err(AppError::Config("session_prefix must not be empty".into()));
        }

        if self.command_timeout_seconds == 0 || self.restore_timeout_seconds == 0 {
            return Err(AppError::Config(
                "timeouts must be greater than zero".into(),
            ));
        }

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        Ok(())
    }
}
