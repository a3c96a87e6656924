//! The fixed agent hierarchy hosted by every session.
//!
//! Agent ids are two digits: the first selects the window, the second the
//! pane. The table is domain-fixed; agent placement never varies between
//! sessions.

use std::sync::OnceLock;

use regex::RegexSet;

/// One slot in the fixed agent hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSlot {
    /// Two-digit agent id.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// tmux window name hosting the agent.
    pub window: &'static str,
    /// Pane index within the window.
    pub pane: u32,
}

/// The complete id → (window, pane) placement table.
pub const AGENT_TABLE: [AgentSlot; 13] = [
    AgentSlot { id: "00", name: "Meta Manager", window: "meta", pane: 0 },
    AgentSlot { id: "10", name: "Design Manager", window: "design", pane: 0 },
    AgentSlot { id: "11", name: "UI Designer", window: "design", pane: 1 },
    AgentSlot { id: "12", name: "UX Designer", window: "design", pane: 2 },
    AgentSlot { id: "13", name: "Visual Designer", window: "design", pane: 3 },
    AgentSlot { id: "20", name: "Development Manager", window: "development", pane: 0 },
    AgentSlot { id: "21", name: "Frontend Developer", window: "development", pane: 1 },
    AgentSlot { id: "22", name: "Backend Developer", window: "development", pane: 2 },
    AgentSlot { id: "23", name: "DevOps", window: "development", pane: 3 },
    AgentSlot { id: "30", name: "Business Manager", window: "business", pane: 0 },
    AgentSlot { id: "31", name: "Accounting", window: "business", pane: 1 },
    AgentSlot { id: "32", name: "Strategy", window: "business", pane: 2 },
    AgentSlot { id: "33", name: "Analytics", window: "business", pane: 3 },
];

/// Foreground-command patterns that count as a running agent.
const RUNNING_PATTERNS: [&str; 1] = ["claude"];

fn running_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(RUNNING_PATTERNS).unwrap_or_else(|_| RegexSet::empty())
    })
}

/// Classify a pane's foreground command as a running agent or not.
#[must_use]
pub fn is_agent_command(command: &str) -> bool {
    running_set().is_match(command)
}
