#![forbid(unsafe_code)]

//! Control plane for tmux-backed multi-agent sessions.
//!
//! The core of the crate is the session lifecycle subsystem: a durable,
//! concurrently-mutated registry of sessions ([`persistence`]), a status
//! resolver that reconciles that registry against live tmux state, and a
//! restoration orchestrator that revives terminated sessions with
//! at-most-one-in-flight serialization and rollback on failure
//! ([`orchestrator`]).

pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod tmux;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
