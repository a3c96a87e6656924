//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Callers outside the core see a small fixed set of categories so a thin
/// boundary layer (HTTP, CLI) can map each one deterministically to a
/// response code instead of inspecting internal error types.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Requested session does not exist or could not be resolved.
    NotFound(String),
    /// An abbreviated session id matched more than one registry record.
    AmbiguousId(String),
    /// Session state forbids the requested operation (still running,
    /// restoration already in progress).
    Conflict(String),
    /// Transient I/O failure that exhausted its local retry bound
    /// (lock-acquisition timeout, registry rewrite failure).
    Transient(String),
    /// Nonzero exit, timeout, or spawn failure from an external tool
    /// (tmux or the restore procedure). Never retried by this layer.
    External(String),
    /// Session metadata file is unreadable or malformed.
    Metadata(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::AmbiguousId(msg) => write!(f, "ambiguous id: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Transient(msg) => write!(f, "transient io: {msg}"),
            Self::External(msg) => write!(f, "external tool: {msg}"),
            Self::Metadata(msg) => write!(f, "metadata: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
