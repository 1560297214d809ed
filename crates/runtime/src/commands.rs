//! Slash commands answered directly by a channel, without a model turn.

use serde_json::Value;

use crate::workspace::{Workspace, MEMORY_FILE, SOUL_FILE};

/// `(name, description)` for every command, in menu order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("whoami", "Show your chat ID"),
    ("memory", "Show current memory"),
    ("soul", "Show agent identity and beliefs"),
    ("help", "List available commands"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    WhoAmI,
    Memory,
    Soul,
    Help,
}

impl Command {
    /// Recognise `/name` (optionally `/name@botname`, as Telegram sends in
    /// groups). Anything else, including unknown commands, is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "whoami" => Some(Self::WhoAmI),
            "memory" => Some(Self::Memory),
            "soul" => Some(Self::Soul),
            "help" | "start" => Some(Self::Help),
            _ => None,
        }
    }

    /// Reply text. `chat_id` is shown by `/whoami` when the channel has one.
    pub fn run(self, workspace: &Workspace, source: &str, chat_id: Option<i64>) -> String {
        match self {
            Self::WhoAmI => whoami(source, chat_id),
            Self::Memory => memory(workspace),
            Self::Soul => soul(workspace),
            Self::Help => usage(),
        }
    }
}

pub fn usage() -> String {
    let lines: Vec<String> = COMMANDS
        .iter()
        .map(|(name, desc)| format!("/{name} - {desc}"))
        .collect();
    format!("Available commands:\n{}", lines.join("\n"))
}

fn whoami(source: &str, chat_id: Option<i64>) -> String {
    let base = format!("You are using {}.", source.to_lowercase());
    match chat_id {
        Some(id) => format!("{base} [Chat ID: {id}]"),
        None => base,
    }
}

fn memory(workspace: &Workspace) -> String {
    if !workspace.path(MEMORY_FILE).exists() {
        return "(No memory)".into();
    }
    let memory = match workspace.read_memory() {
        Ok(m) => m,
        Err(e) => return format!("Error reading memory: {e}"),
    };
    if memory.is_empty() {
        return "(Empty memory)".into();
    }
    let lines: Vec<String> = memory
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("• {k}: {s}"),
            other => format!("• {k}: {other}"),
        })
        .collect();
    format!("Memory:\n{}", lines.join("\n"))
}

fn soul(workspace: &Workspace) -> String {
    match workspace.read_text(SOUL_FILE) {
        Ok(None) => "(No soul)".into(),
        Ok(Some(text)) if text.is_empty() => "(Empty soul)".into(),
        Ok(Some(text)) => text,
        Err(e) => format!("Error reading soul: {e}"),
    }
}
