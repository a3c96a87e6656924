//! tmux command invocation and output parsing.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::models::session::{AgentDescriptor, WindowInfo};
use crate::tmux::agents::{is_agent_command, AGENT_TABLE};
use crate::{AppError, Result};

/// Per-session facts from `tmux list-sessions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmuxSessionInfo {
    /// Number of windows in the session.
    pub window_count: u32,
    /// Whether any client is attached.
    pub is_attached: bool,
}

/// Client for the tmux control interface.
///
/// Every invocation goes through [`tokio::process::Command`] with an
/// argument vector (never a shell string) and a hard wall-clock timeout.
/// A timeout is a failure at this layer and is not retried here; the
/// called commands are side-effecting and not proven idempotent.
#[derive(Debug, Clone)]
pub struct TmuxClient {
    tmux_bin: PathBuf,
    socket: Option<PathBuf>,
    session_prefix: String,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl TmuxClient {
    /// Build a client from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            tmux_bin: config.tmux_bin.clone(),
            socket: config.tmux_socket.clone(),
            session_prefix: config.session_prefix.clone(),
            command_timeout: config.command_timeout(),
            probe_timeout: config.agent_probe_timeout(),
        }
    }

    /// Naming-convention prefix for session names.
    #[must_use]
    pub fn session_prefix(&self) -> &str {
        &self.session_prefix
    }

    /// List live session names matching the naming convention.
    ///
    /// Returns an empty list (not an error) when the tmux server is not
    /// running at all.
    ///
    /// # Errors
    ///
    /// Returns `AppError::External` on any other tmux failure.
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let output = self
            .output(&["list-sessions", "-F", "#{session_name}"], self.command_timeout)
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_server_down(&stderr) {
                return Ok(Vec::new());
            }
            return Err(AppError::External(format!(
                "tmux list-sessions failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_name_lines(
            &String::from_utf8_lossy(&output.stdout),
            &self.session_prefix,
        ))
    }

    /// Whether a session with this exact name is live.
    ///
    /// # Errors
    ///
    /// Returns `AppError::External` if tmux cannot be invoked at all.
    pub async fn session_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .output(&["has-session", "-t", name], self.command_timeout)
            .await?;
        Ok(output.status.success())
    }

    /// Window count and attachment state for one session, `None` when the
    /// session (or the server) is gone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::External` on tmux failures other than "server
    /// not running".
    pub async fn session_info(&self, name: &str) -> Result<Option<TmuxSessionInfo>> {
        let output = self
            .output(
                &[
                    "list-sessions",
                    "-F",
                    "#{session_name}|#{session_windows}|#{session_attached}",
                ],
                self.command_timeout,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_server_down(&stderr) {
                return Ok(None);
            }
            return Err(AppError::External(format!(
                "tmux list-sessions failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().find_map(|line| {
            let (line_name, info) = parse_session_info_line(line)?;
            (line_name == name).then_some(info)
        }))
    }

    /// Windows of a session. Best-effort: failures degrade to empty.
    pub async fn list_windows(&self, name: &str) -> Vec<WindowInfo> {
        let result = self
            .output(
                &[
                    "list-windows",
                    "-t",
                    name,
                    "-F",
                    "#{window_index}|#{window_name}|#{window_panes}|#{window_active}",
                ],
                self.command_timeout,
            )
            .await;

        match result {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .filter_map(parse_window_line)
                .collect(),
            Ok(_) | Err(_) => Vec::new(),
        }
    }

    /// Kill a live session. A session that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::External` on any other tmux failure.
    pub async fn kill_session(&self, name: &str, force: bool) -> Result<()> {
        debug!(session = name, force, "killing tmux session");
        let output = self
            .output(&["kill-session", "-t", name], self.command_timeout)
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !is_session_gone(&stderr) {
                return Err(AppError::External(format!(
                    "tmux kill-session failed: {}",
                    stderr.trim()
                )));
            }
        }
        Ok(())
    }

    /// Send text (optionally followed by Enter) to one pane.
    ///
    /// # Errors
    ///
    /// Returns `AppError::External` if the send fails.
    pub async fn send_keys(
        &self,
        name: &str,
        window: u32,
        pane: u32,
        text: &str,
        execute: bool,
    ) -> Result<()> {
        let target = format!("{name}:{window}.{pane}");
        let mut args = vec!["send-keys", "-t", target.as_str(), text];
        if execute {
            args.push("Enter");
        }

        let output = self.output(&args, self.command_timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::External(format!(
                "tmux send-keys failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Live status of every agent in the fixed hierarchy.
    ///
    /// Any per-agent introspection failure degrades that one agent to
    /// stopped rather than failing the whole call.
    pub async fn agent_statuses(&self, name: &str) -> Vec<AgentDescriptor> {
        let windows = self.list_windows(name).await;

        let mut agents = Vec::with_capacity(AGENT_TABLE.len());
        for slot in &AGENT_TABLE {
            let running = match windows.iter().find(|w| w.name == slot.window) {
                Some(window) => self
                    .pane_command(name, window.index, slot.pane)
                    .await
                    .as_deref()
                    .is_some_and(is_agent_command),
                None => false,
            };
            agents.push(AgentDescriptor {
                agent_id: slot.id,
                name: slot.name,
                running,
                window: slot.window,
                pane: slot.pane,
            });
        }
        agents
    }

    /// Shell command a client can run to attach to a session.
    #[must_use]
    pub fn attach_command(&self, name: &str) -> String {
        match &self.socket {
            Some(socket) => format!(
                "{} -S {} attach-session -t {name}",
                self.tmux_bin.display(),
                socket.display()
            ),
            None => format!("{} attach-session -t {name}", self.tmux_bin.display()),
        }
    }

    /// Foreground command of one pane, best-effort.
    async fn pane_command(&self, name: &str, window_index: u32, pane: u32) -> Option<String> {
        let target = format!("{name}:{window_index}");
        let output = self
            .output(
                &[
                    "list-panes",
                    "-t",
                    target.as_str(),
                    "-F",
                    "#{pane_index}|#{pane_current_command}",
                ],
                self.probe_timeout,
            )
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_pane_line)
            .find_map(|(index, command)| (index == pane).then_some(command))
    }

    async fn output(&self, args: &[&str], timeout: Duration) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.tmux_bin);
        if let Some(socket) = &self.socket {
            cmd.arg("-S").arg(socket);
        }
        cmd.args(args).stdin(Stdio::null());

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(AppError::External(format!(
                "failed to run tmux {}: {err}",
                args.first().unwrap_or(&"")
            ))),
            Err(_) => Err(AppError::External(format!(
                "tmux {} timed out after {timeout:?}",
                args.first().unwrap_or(&"")
            ))),
        }
    }
}

fn is_server_down(stderr: &str) -> bool {
    stderr.contains("no server running")
        || stderr.contains("no sessions")
        || stderr.contains("error connecting")
}

fn is_session_gone(stderr: &str) -> bool {
    stderr.contains("session not found") || stderr.contains("can't find session")
}

/// Filter `list-sessions -F "#{session_name}"` output down to names that
/// follow the naming convention.
#[must_use]
pub fn parse_name_lines(stdout: &str, prefix: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.starts_with(prefix))
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse one `name|windows|attached` line.
#[must_use]
pub fn parse_session_info_line(line: &str) -> Option<(String, TmuxSessionInfo)> {
    let mut parts = line.trim().split('|');
    let name = parts.next()?.to_owned();
    let window_count = parts.next()?.parse().ok()?;
    let is_attached = parts.next()?.parse::<u32>().is_ok_and(|n| n > 0);
    Some((
        name,
        TmuxSessionInfo {
            window_count,
            is_attached,
        },
    ))
}

/// Parse one `index|name|panes|active` line.
#[must_use]
pub fn parse_window_line(line: &str) -> Option<WindowInfo> {
    let mut parts = line.trim().split('|');
    Some(WindowInfo {
        index: parts.next()?.parse().ok()?,
        name: parts.next()?.to_owned(),
        pane_count: parts.next()?.parse().ok()?,
        active: parts.next() == Some("1"),
    })
}

/// Parse one `index|command` line.
#[must_use]
pub fn parse_pane_line(line: &str) -> Option<(u32, String)> {
    let (index, command) = line.trim().split_once('|')?;
    Some((index.parse().ok()?, command.to_owned()))
}
