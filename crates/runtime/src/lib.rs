//! `sc-runtime`: the agent side of a SafeClaw turn.
//!
//! A channel hands user text to the [`TurnEngine`], which renders the
//! workspace prompt, asks the completion provider, [`parse`]s the reply
//! for a tool-call block, and runs each call through the
//! [`ActionDispatcher`]: registered [`LocalCapability`]s in-process,
//! everything else on a router worker via the broker.

pub mod capabilities;
pub mod capability;
pub mod commands;
pub mod dispatch;
pub mod fanout;
pub mod lock;
pub mod parser;
pub mod prompt;
pub mod turn;
pub mod workspace;

pub use capabilities::builtin_registry;
pub use capability::{LocalCapability, LocalRegistry, Resolution};
pub use commands::Command;
pub use dispatch::{ActionDispatcher, DispatchOutcome, StatusSink};
pub use fanout::{BusyGroup, BusyHandle, ChannelHub, ChannelSession, BUSY_REFRESH};
pub use lock::OriginLocks;
pub use parser::{parse, ParseError, ParsedResponse};
pub use prompt::PromptBuilder;
pub use turn::{TurnEngine, TurnOutcome, TurnStage, EMPTY_PROMPT_REPLY};
pub use workspace::Workspace;
