#![forbid(unsafe_code)]

//! `mas-control` — session control-plane CLI.
//!
//! Thin command layer over the session lifecycle core: list and inspect
//! sessions, build attach descriptors, restore terminated sessions, and
//! stop live ones. The heavy lifting (registry locking, status
//! resolution, restoration) lives in the library.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mas_control::config::GlobalConfig;
use mas_control::models::session::SessionStatus;
use mas_control::orchestrator::restore::{restore_session, RestoreOptions};
use mas_control::orchestrator::runner::ScriptRunner;
use mas_control::orchestrator::session_manager;
use mas_control::persistence::IndexStore;
use mas_control::tmux::TmuxClient;
use mas_control::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "mas-control", about = "Control plane for tmux-backed multi-agent sessions", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace root override (defaults to the current directory when no
    /// config file is given).
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all known sessions with live-resolved status.
    List {
        /// Only show sessions in this status
        /// (active, inactive, terminated, restoring).
        #[arg(long)]
        status: Option<SessionStatus>,
    },
    /// Show full detail for one session.
    Show {
        /// Full or abbreviated session id.
        id: String,
    },
    /// Build an attach descriptor for a live session.
    Connect {
        /// Full or abbreviated session id.
        id: String,
    },
    /// Restore a terminated session.
    Restore {
        /// Full or abbreviated session id.
        id: String,
        /// Also start the agent processes.
        #[arg(long)]
        start_agents: bool,
        /// Kill a still-live session before restoring.
        #[arg(long)]
        force: bool,
    },
    /// Stop a session's tmux process tree.
    Stop {
        /// Full or abbreviated session id.
        id: String,
        /// Kill without waiting for a graceful exit.
        #[arg(long)]
        force: bool,
    },
    /// Send text to one agent pane.
    Send {
        /// Full or abbreviated session id.
        id: String,
        /// Window index.
        window: u32,
        /// Pane index within the window.
        pane: u32,
        /// Text to send.
        text: String,
        /// Follow the text with Enter.
        #[arg(long)]
        enter: bool,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => {
            let root = match args.workspace.clone() {
                Some(root) => root,
                None => std::env::current_dir().map_err(|err| {
                    AppError::Config(format!("cannot determine current directory: {err}"))
                })?,
            };
            GlobalConfig::with_workspace_root(root)?
        }
    };

    // A workspace override beats the config file, like every other CLI flag.
    if args.config.is_some() {
        if let Some(root) = args.workspace {
            config.workspace_root = root.canonicalize().map_err(|err| {
                AppError::Config(format!("invalid workspace override: {err}"))
            })?;
        }
    }

    info!(workspace = %config.workspace_root.display(), "configuration loaded");

    let store = IndexStore::new(config.sessions_dir());
    let tmux = TmuxClient::from_config(&config);

    match args.command {
        Command::List { status } => {
            let sessions = session_manager::list_sessions(&store, &tmux, status).await;
            print_json(&sessions)
        }
        Command::Show { id } => {
            let detail = session_manager::get_session_detail(&store, &tmux, &id).await?;
            print_json(&detail)
        }
        Command::Connect { id } => {
            let descriptor = session_manager::connect(&tmux, &id).await?;
            print_json(&descriptor)
        }
        Command::Restore {
            id,
            start_agents,
            force,
        } => {
            let runner = ScriptRunner::from_config(&config);
            let descriptor = restore_session(
                &store,
                &tmux,
                &runner,
                &config.workspace_root,
                &id,
                RestoreOptions {
                    start_agents,
                    force,
                },
            )
            .await?;
            print_json(&descriptor)
        }
        Command::Stop { id, force } => {
            let record = session_manager::stop(&store, &tmux, &id, force).await?;
            print_json(&record)
        }
        Command::Send {
            id,
            window,
            pane,
            text,
            enter,
        } => {
            let record = store.resolve_session_id(&id).await?;
            tmux.send_keys(&record.tmux_name, window, pane, &text, enter)
                .await?;
            info!(session_id = %record.session_id, window, pane, "text sent");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Config(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
