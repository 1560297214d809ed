//! Turn bookkeeping: the per-turn record, the bounded rolling history, and
//! the artifact persisted from the latest turn.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionResult;

/// Maximum number of history entries kept after a turn completes.
pub const HISTORY_LIMIT: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One record in the rolling input history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    Input {
        #[serde(alias = "input")]
        user_input: String,
        response: String,
    },
    FollowUp {
        follow_up_action: String,
        response: String,
    },
}

impl HistoryEntry {
    pub fn input(user_input: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Input {
            user_input: user_input.into(),
            response: response.into(),
        }
    }

    pub fn follow_up(action: impl Into<String>, response: impl Into<String>) -> Self {
        Self::FollowUp {
            follow_up_action: action.into(),
            response: response.into(),
        }
    }
}

/// Ordered, bounded history. Appending past the bound evicts the oldest
/// entries first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Rebuild from persisted entries, keeping only the newest `limit`.
    pub fn from_entries(entries: Vec<HistoryEntry>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for entry in entries {
            history.push(entry);
        }
        history
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn + Artifact
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persisted record of the latest turn's action outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub timestamp: DateTime<Utc>,
    pub data: Vec<ActionResult>,
    #[serde(default)]
    pub follow_up_results: Vec<ActionResult>,
}

/// One request/response cycle.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_input: String,
    pub channel_source: String,
    pub message: String,
    pub action_results: Vec<ActionResult>,
    pub follow_up_results: Vec<ActionResult>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn begin(user_input: impl Into<String>, channel_source: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            channel_source: channel_source.into(),
            message: String::new(),
            action_results: Vec::new(),
            follow_up_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn has_actions(&self) -> bool {
        !self.action_results.is_empty()
    }

    pub fn artifact(&self) -> Artifact {
        Artifact {
            timestamp: self.timestamp,
            data: self.action_results.clone(),
            follow_up_results: self.follow_up_results.clone(),
        }
    }

    /// Message followed by each action's and follow-up's readable output,
    /// joined with blank lines.
    pub fn compose_reply(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.message.is_empty() {
            parts.push(self.message.clone());
        }
        parts.extend(self.action_results.iter().filter_map(ActionResult::display_text));
        parts.extend(self.follow_up_results.iter().filter_map(ActionResult::display_text));
        parts.join("\n\n")
    }
}
