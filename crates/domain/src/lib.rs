//! Shared types for the SafeClaw crates: action calls and results, turn
//! bookkeeping records, the common error type, and the config tree.

pub mod action;
pub mod config;
pub mod error;
pub mod turn;

pub use action::{normalize_action_name, ActionCall, ActionResult, ActionStatus};
pub use error::{Error, Result};
pub use turn::{Artifact, History, HistoryEntry, Turn, HISTORY_LIMIT};
