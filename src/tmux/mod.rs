//! Adapter over the external tmux control interface.
//!
//! All operations are best-effort reads plus side-effecting commands, not
//! transactions: tmux state can change between any two calls.

pub mod agents;
mod client;

pub use client::{
    parse_name_lines, parse_pane_line, parse_session_info_line, parse_window_line, TmuxClient,
    TmuxSessionInfo,
};
