//! Console channel: a rustyline prompt on the terminal.
//!
//! rustyline blocks, so the editor lives on its own thread and hands each
//! line to the async side only when asked for one. The prompt is never
//! shown while a Console turn is running.

use std::io::Write;
use std::sync::Arc;

use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use sc_domain::error::Result;
use sc_runtime::{ChannelSession, Command};

use crate::bootstrap::AgentState;
use crate::channels::dialog;

pub const SOURCE: &str = "Console";
const PROMPT: &str = "You: ";

/// What to do with one line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Skip,
    Quit,
    Command(Command),
    Turn(String),
}

impl ConsoleInput {
    pub fn classify(line: &str) -> Self {
        let text = line.trim();
        if text.is_empty() {
            return Self::Skip;
        }
        if matches!(text.to_ascii_lowercase().as_str(), "quit" | "exit" | "q") {
            return Self::Quit;
        }
        match Command::parse(text) {
            Some(cmd) => Self::Command(cmd),
            None => Self::Turn(text.to_string()),
        }
    }
}

pub struct ConsoleChannel {
    agent_name: String,
}

impl ConsoleChannel {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    fn print_reply(&self, text: &str) {
        println!("\n{}: {text}\n", self.agent_name);
    }
}

#[async_trait::async_trait]
impl ChannelSession for ConsoleChannel {
    fn source_name(&self) -> &str {
        SOURCE
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.print_reply(text);
        Ok(())
    }

    async fn broadcast_receive(&self, text: &str, origin: &str) {
        println!("[{origin}] {text}");
    }

    async fn broadcast_response(&self, text: &str, _origin: &str) {
        self.print_reply(text);
        print!("{PROMPT}");
        let _ = std::io::stdout().flush();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reader thread
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum ReadEvent {
    Line(String),
    Closed,
    Failed(String),
}

/// Line reader on a dedicated thread. Each `next` asks for exactly one line.
struct LineReader {
    want: std::sync::mpsc::Sender<()>,
    lines: mpsc::Receiver<ReadEvent>,
}

impl LineReader {
    fn spawn() -> Self {
        let (want_tx, want_rx) = std::sync::mpsc::channel::<()>();
        let (line_tx, line_rx) = mpsc::channel(1);

        std::thread::spawn(move || {
            let mut editor = match rustyline::DefaultEditor::new() {
                Ok(e) => e,
                Err(e) => {
                    let _ = line_tx.blocking_send(ReadEvent::Failed(e.to_string()));
                    return;
                }
            };
            while want_rx.recv().is_ok() {
                let event = match editor.readline(PROMPT) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        ReadEvent::Line(line)
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => ReadEvent::Closed,
                    Err(e) => ReadEvent::Failed(e.to_string()),
                };
                let last = !matches!(event, ReadEvent::Line(_));
                if line_tx.blocking_send(event).is_err() || last {
                    break;
                }
            }
        });

        Self {
            want: want_tx,
            lines: line_rx,
        }
    }

    async fn next(&mut self) -> ReadEvent {
        if self.want.send(()).is_err() {
            return ReadEvent::Closed;
        }
        self.lines.recv().await.unwrap_or(ReadEvent::Closed)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Receive loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read, run, reply until the user quits or the agent shuts down.
/// Returning cancels `state.shutdown`, taking the other channels down too.
pub async fn run(state: Arc<AgentState>, console: Arc<ConsoleChannel>) -> anyhow::Result<()> {
    let mut reader = LineReader::spawn();
    let shutdown = state.shutdown.clone();

    let result = loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            event = reader.next() => event,
        };
        let line = match event {
            ReadEvent::Line(line) => line,
            ReadEvent::Closed => break Ok(()),
            ReadEvent::Failed(e) => break Err(anyhow::anyhow!("console input failed: {e}")),
        };

        match ConsoleInput::classify(&line) {
            ConsoleInput::Skip => continue,
            ConsoleInput::Quit => break Ok(()),
            ConsoleInput::Command(cmd) => {
                console.print_reply(&cmd.run(state.engine.workspace(), SOURCE, None));
            }
            ConsoleInput::Turn(text) => {
                let reply = state.engine.run_channel_turn(&text, SOURCE, &dialog).await;
                console.print_reply(&reply);
            }
        }
    };

    tracing::info!("console channel stopped");
    shutdown.cancel();
    result
}
