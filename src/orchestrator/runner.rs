//! Boundary to the external restore procedure.
//!
//! Production restores go through a shell library that recreates the tmux
//! session under the derived name and optionally starts the agent
//! processes. The trait seam lets tests substitute a scripted runner.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::models::session::derive_tmux_name;
use crate::{AppError, Result};

/// Arguments passed to the external restore procedure.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Full session id to restore.
    pub session_id: Uuid,
    /// Whether the procedure should also start the agent processes.
    pub start_agents: bool,
    /// Workspace root exported to the procedure.
    pub workspace_root: PathBuf,
}

/// Successful restore result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Name of the recreated tmux session.
    pub tmux_name: String,
}

/// Invoker of the external restore procedure.
pub trait RestoreRunner: Send + Sync {
    /// Run the restore procedure to completion within its bounded timeout.
    fn run(&self, req: &RestoreRequest) -> impl Future<Output = Result<RestoreOutcome>> + Send;
}

/// Production runner: sources the restore shell library and calls its
/// `restore_session` function with a hard wall-clock timeout.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: PathBuf,
    timeout: Duration,
    session_prefix: String,
}

impl ScriptRunner {
    /// Build a runner from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            script: config.restore_script(),
            timeout: config.restore_timeout(),
            session_prefix: config.session_prefix.clone(),
        }
    }
}

impl RestoreRunner for ScriptRunner {
    async fn run(&self, req: &RestoreRequest) -> Result<RestoreOutcome> {
        let invocation = format!(
            "source '{}'; restore_session '{}' '{}'",
            self.script.display(),
            req.session_id,
            if req.start_agents { "true" } else { "false" },
        );
        debug!(session_id = %req.session_id, script = %self.script.display(), "invoking restore procedure");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(&invocation)
            .env("MAS_WORKSPACE_ROOT", &req.workspace_root)
            .stdin(Stdio::null());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(AppError::External(format!(
                    "failed to invoke restore procedure: {err}"
                )))
            }
            Err(_) => {
                return Err(AppError::External(format!(
                    "restore procedure timed out after {:?}",
                    self.timeout
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Exit code 2 from the library: the session is already live. The
        // message can land on either stream. Distinguishable from real
        // failures so the caller maps it to Conflict, not ExternalFailure.
        if stdout.contains("Session already exists") || stderr.contains("Session already exists") {
            return Err(AppError::Conflict(
                "session already exists and is running".into(),
            ));
        }

        if !output.status.success() {
            return Err(AppError::External(format!(
                "restore procedure failed ({}): {}",
                output.status,
                pick_message(&stderr, &stdout)
            )));
        }

        if stderr.contains("[ERROR]") {
            return Err(AppError::External(format!(
                "restore procedure reported: {}",
                strip_log_tags(&stderr)
            )));
        }

        let tmux_name = extract_session_name(&stdout, &self.session_prefix)
            .unwrap_or_else(|| derive_tmux_name(&self.session_prefix, req.session_id));

        Ok(RestoreOutcome { tmux_name })
    }
}

fn pick_message<'a>(stderr: &'a str, stdout: &'a str) -> &'a str {
    let err = stderr.trim();
    if err.is_empty() {
        stdout.trim()
    } else {
        err
    }
}

/// Drop `[LEVEL]`-style log tags so only the message survives.
fn strip_log_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0u32;
    for ch in text.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_owned()
}

/// Find the recreated session name in the procedure's output.
fn extract_session_name(stdout: &str, prefix: &str) -> Option<String> {
    let pattern = format!("{}[0-9a-f]{{8}}", regex::escape(prefix));
    let re = Regex::new(&pattern).ok()?;
    re.find(stdout).map(|m| m.as_str().to_owned())
}
