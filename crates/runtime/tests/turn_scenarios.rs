//! End-to-end turns against a scripted completion provider, a temp
//! workspace, and (where needed) a real broker worker on an in-process
//! queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sc_broker::{
    BrokerClient, BrokerServer, CapabilityContext, CapabilityResult, MemoryQueue, RemoteCapability,
    RemoteRegistry,
};
use sc_domain::config::{BrokerConfig, RouterConfig};
use sc_domain::{ActionStatus, HistoryEntry};
use sc_providers::CompletionProvider;
use sc_runtime::workspace::{ARTIFACT_FILE, MEMORY_FILE};
use sc_runtime::{
    builtin_registry, ActionDispatcher, BusyHandle, ChannelHub, ChannelSession, TurnEngine,
    TurnStage, Workspace, BUSY_REFRESH, EMPTY_PROMPT_REPLY,
};

// ── Fixtures ────────────────────────────────────────────────────────────

/// Replies with queued outputs in order; records every prompt.
struct Scripted {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(replies: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for Scripted {
    async fn chat(&self, prompt: &str) -> sc_domain::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match self.replies.lock().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(sc_domain::Error::Http(e)),
            None => Ok("Nothing more to say.".into()),
        }
    }
    fn provider_id(&self) -> &str {
        "scripted"
    }
    fn model(&self) -> &str {
        "test"
    }
    fn error_hint(&self) -> &str {
        "(scripted hint)"
    }
}

struct Panicky;

#[async_trait::async_trait]
impl CompletionProvider for Panicky {
    async fn chat(&self, _prompt: &str) -> sc_domain::Result<String> {
        panic!("provider exploded")
    }
    fn provider_id(&self) -> &str {
        "panicky"
    }
    fn model(&self) -> &str {
        "test"
    }
}

fn workspace() -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path().join("workspace"));
    ws.bootstrap().unwrap();
    (dir, ws)
}

fn engine(
    ws: &Workspace,
    provider: Arc<dyn CompletionProvider>,
    broker: Option<Arc<BrokerClient>>,
) -> TurnEngine {
    let dispatcher = ActionDispatcher::new(builtin_registry(ws, provider.clone()), broker);
    TurnEngine::new(provider, dispatcher, ws.clone())
}

fn quiet() -> impl Fn(&str) + Send + Sync {
    |_: &str| {}
}

fn read_json(ws: &Workspace, name: &str) -> Value {
    serde_json::from_str(&std::fs::read_to_string(ws.path(name)).unwrap()).unwrap()
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_block_reply_is_just_the_message() {
    let (_dir, ws) = workspace();
    let engine = engine(&ws, Scripted::new(["Done.\n<tool_code>[]</tool_code>"]), None);

    let outcome = engine.run_turn("tidy up", "Console", &quiet()).await;

    assert_eq!(outcome.reply, "Done.");
    assert_eq!(outcome.stage, TurnStage::Done);
    let turn = outcome.turn.unwrap();
    assert_eq!(turn.message, "Done.");
    assert!(turn.action_results.is_empty());
    // No actions: artifact untouched.
    assert_eq!(read_json(&ws, ARTIFACT_FILE), json!({}));
    assert_eq!(
        ws.load_history(10).to_vec(),
        vec![HistoryEntry::input("tidy up", "Done.")]
    );
}

#[tokio::test]
async fn memory_write_updates_empty_store() {
    let (_dir, ws) = workspace();
    let provider = Scripted::new([
        "Noted.\n<tool_code>[{\"name\":\"MEMORY_WRITE\",\"params\":{\"new_memory\":{\"k\":\"v\"}}}]</tool_code>",
    ]);
    let engine = engine(&ws, provider, None);

    let outcome = engine.run_turn("remember k=v", "Console", &quiet()).await;

    let turn = outcome.turn.unwrap();
    assert_eq!(turn.action_results.len(), 1);
    assert_eq!(turn.action_results[0].status, ActionStatus::Ok);
    assert_eq!(read_json(&ws, MEMORY_FILE), json!({"k": "v"}));
    assert_eq!(outcome.reply, "Noted.\n\nMemory updated: {\"k\":\"v\"}");

    let artifact = ws.load_artifact().unwrap().unwrap();
    assert_eq!(artifact.data.len(), 1);
    assert_eq!(artifact.data[0].action, "MEMORY_WRITE");
}

#[tokio::test(start_paused = true)]
async fn unanswered_remote_action_fails_after_full_timeout() {
    let (_dir, ws) = workspace();
    let queue = Arc::new(MemoryQueue::new());
    let timeout = Duration::from_secs(3);
    let broker = Arc::new(BrokerClient::new(queue.clone(), timeout));
    let engine = engine(
        &ws,
        Scripted::new(["Pinging.\n<tool_code>[{\"name\":\"PING\",\"params\":{}}]</tool_code>"]),
        Some(broker),
    );

    let started = Instant::now();
    let outcome = engine.run_turn("ping the router", "Console", &quiet()).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= timeout, "returned after {elapsed:?}");
    let result = &outcome.turn.unwrap().action_results[0];
    assert_eq!(result.action, "PING");
    assert_eq!(result.status, ActionStatus::Failed);
    assert!(result.error().unwrap().contains("timed out"));
    assert!(outcome.reply.contains("Error: timed out after 3s waiting for router"));
    // The command is still sitting on the queue for a worker that never came.
    assert_eq!(queue.len(sc_protocol::COMMAND_QUEUE), 1);
}

/// Remote capability that asks for one local follow-up.
struct FetchCapability {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl RemoteCapability for FetchCapability {
    async fn execute(&self, _ctx: CapabilityContext, _params: Map<String, Value>) -> CapabilityResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "text": "Fetched the page.",
            "follow_up": {"name": "MEMORY_WRITE", "params": {"new_memory": {"fetched": true}}}
        })
        .as_object()
        .cloned()
        .unwrap())
    }
}

#[tokio::test(start_paused = true)]
async fn remote_follow_up_runs_once_and_is_recorded_separately() {
    let (_dir, ws) = workspace();
    let queue = Arc::new(MemoryQueue::new());
    let config = BrokerConfig {
        timeout_secs: 5,
        ..BrokerConfig::default()
    };

    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = RemoteRegistry::new();
    registry.register("FetchCapability", FetchCapability { calls: calls.clone() });
    let server = BrokerServer::new(queue.clone(), registry, &config, RouterConfig::default());
    let shutdown = CancellationToken::new();
    let worker = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(shutdown).await })
    };

    let broker = Arc::new(BrokerClient::from_config(queue.clone(), &config));
    let engine = engine(
        &ws,
        Scripted::new(["On it.\n<tool_code>[{\"name\":\"fetch\",\"params\":{\"url\":\"https://example.com\"}}]</tool_code>"]),
        Some(broker),
    );

    let outcome = engine.run_turn("fetch example.com", "Console", &quiet()).await;
    shutdown.cancel();
    worker.await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let turn = outcome.turn.unwrap();
    assert_eq!(turn.action_results.len(), 1);
    assert_eq!(turn.action_results[0].action, "FETCH");
    assert!(turn.action_results[0].follow_up.is_some());
    assert_eq!(turn.follow_up_results.len(), 1);
    assert_eq!(turn.follow_up_results[0].action, "MEMORY_WRITE");
    assert_eq!(turn.follow_up_results[0].status, ActionStatus::Ok);
    assert_eq!(read_json(&ws, MEMORY_FILE), json!({"fetched": true}));

    assert_eq!(
        outcome.reply,
        "On it.\n\nFetched the page.\n\nMemory updated: {\"fetched\":true}"
    );

    let artifact = ws.load_artifact().unwrap().unwrap();
    assert_eq!(artifact.data.len(), 1);
    assert_eq!(artifact.follow_up_results.len(), 1);

    assert_eq!(
        ws.load_history(10).to_vec(),
        vec![
            HistoryEntry::follow_up("MEMORY_WRITE", "Memory updated: {\"fetched\":true}"),
            HistoryEntry::input("fetch example.com", "On it."),
        ]
    );
}

// ── Failure paths ───────────────────────────────────────────────────────

#[tokio::test]
async fn empty_input_skips_the_provider() {
    let (_dir, ws) = workspace();
    let provider = Scripted::new([]);
    let engine = engine(&ws, provider.clone(), None);

    let outcome = engine.run_turn("   ", "Console", &quiet()).await;

    assert_eq!(outcome.reply, EMPTY_PROMPT_REPLY);
    assert_eq!(outcome.stage, TurnStage::Prompting);
    assert!(provider.prompts.lock().is_empty());
}

#[tokio::test]
async fn provider_error_carries_hint_and_skips_history() {
    let (_dir, ws) = workspace();
    let engine = engine(&ws, Scripted::failing("connection refused"), None);

    let reply = engine.process("hello", "Console", &quiet()).await;

    assert_eq!(reply, "Error: HTTP: connection refused\n(scripted hint)");
    assert!(ws.load_history(10).is_empty());
}

#[tokio::test]
async fn parse_error_is_a_reply_and_is_remembered() {
    let (_dir, ws) = workspace();
    let engine = engine(&ws, Scripted::new(["Hi <tool_code>[not json]</tool_code>"]), None);

    let outcome = engine.run_turn("hello", "Console", &quiet()).await;

    assert_eq!(outcome.stage, TurnStage::Parsing);
    assert!(outcome.reply.starts_with("(Parse error: invalid tool_code block"));
    let history = ws.load_history(10).to_vec();
    assert_eq!(history, vec![HistoryEntry::input("hello", outcome.reply.clone())]);
}

#[tokio::test]
async fn one_failing_action_does_not_stop_the_next() {
    let (_dir, ws) = workspace();
    let provider = Scripted::new([
        "Two things.\n<tool_code>[{\"name\":\"MEMORY_WRITE\",\"params\":{}},{\"name\":\"MEMORY_WRITE\",\"params\":{\"new_memory\":{\"a\":1}}}]</tool_code>",
    ]);
    let engine = engine(&ws, provider, None);

    let turn = engine.run_turn("do both", "Console", &quiet()).await.turn.unwrap();

    assert_eq!(turn.action_results[0].status, ActionStatus::Failed);
    assert_eq!(turn.action_results[1].status, ActionStatus::Ok);
    assert_eq!(read_json(&ws, MEMORY_FILE), json!({"a": 1}));
}

#[tokio::test]
async fn history_stays_bounded_across_turns() {
    let (_dir, ws) = workspace();
    let engine = engine(&ws, Scripted::new([]), None);

    for i in 0..15 {
        engine.process(&format!("turn {i}"), "Console", &quiet()).await;
        assert!(ws.load_history(100).len() <= 10);
    }

    let history = ws.load_history(100).to_vec();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0], HistoryEntry::input("turn 5", "Nothing more to say."));
    assert_eq!(history[9], HistoryEntry::input("turn 14", "Nothing more to say."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_turns_from_different_origins_are_all_recorded() {
    let (_dir, ws) = workspace();
    let engine = Arc::new(engine(&ws, Scripted::new([]), None));

    let turns: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .process(&format!("turn {i}"), &format!("origin-{i}"), &|_: &str| {})
                    .await
            })
        })
        .collect();
    for turn in turns {
        turn.await.unwrap();
    }

    let history = ws.load_history(100).to_vec();
    assert_eq!(history.len(), 8);
    for i in 0..8 {
        assert!(history.contains(&HistoryEntry::input(&format!("turn {i}"), "Nothing more to say.")));
    }
}

#[tokio::test]
async fn prompt_sees_previous_turn() {
    let (_dir, ws) = workspace();
    std::fs::write(ws.path("PROMPT.md"), "{{USER_INPUT_HISTORY}}\n---\n{{USER_MESSAGE}}").unwrap();
    let provider = Scripted::new(["First answer.", "Second answer."]);
    let engine = engine(&ws, provider.clone(), None);

    engine.process("first", "Console", &quiet()).await;
    engine.process("second", "Console", &quiet()).await;

    let prompts = provider.prompts.lock();
    assert!(prompts[1].contains("\"user_input\": \"first\""));
    assert!(prompts[1].contains("\"response\": \"First answer.\""));
    assert!(prompts[1].ends_with("---\nsecond"));
}

// ── Fan-out ─────────────────────────────────────────────────────────────

struct Mirror {
    name: &'static str,
    received: Mutex<Vec<String>>,
    responses: Mutex<Vec<String>>,
    refreshes: Arc<AtomicUsize>,
}

impl Mirror {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            received: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            refreshes: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait::async_trait]
impl ChannelSession for Mirror {
    fn source_name(&self) -> &str {
        self.name
    }
    async fn send(&self, _text: &str) -> sc_domain::Result<()> {
        Ok(())
    }
    async fn broadcast_receive(&self, text: &str, origin: &str) {
        self.received.lock().push(format!("[{origin}] {text}"));
    }
    async fn broadcast_response(&self, text: &str, _origin: &str) {
        self.responses.lock().push(text.to_string());
    }
    fn start_busy(&self) -> Option<BusyHandle> {
        let refreshes = self.refreshes.clone();
        Some(BusyHandle::spawn(self.name, BUSY_REFRESH, move || {
            refreshes.fetch_add(1, Ordering::SeqCst);
            async {}
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn channel_turn_mirrors_and_stops_indicators() {
    let (_dir, ws) = workspace();
    let hub = Arc::new(ChannelHub::new());
    let console = Mirror::new("Console");
    let telegram = Mirror::new("Telegram");
    hub.register(console.clone());
    hub.register(telegram.clone());

    let engine = engine(&ws, Scripted::new(["Hello there."]), None).with_channels(hub);

    let reply = engine.run_channel_turn("hi", "Console", &quiet()).await;
    assert_eq!(reply, "Hello there.");

    assert!(console.received.lock().is_empty());
    assert!(console.responses.lock().is_empty());
    assert_eq!(console.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(*telegram.received.lock(), vec!["[Console] hi".to_string()]);
    assert_eq!(*telegram.responses.lock(), vec!["Hello there.".to_string()]);

    let settled = telegram.refreshes.load(Ordering::SeqCst);
    tokio::time::sleep(BUSY_REFRESH * 4).await;
    assert_eq!(telegram.refreshes.load(Ordering::SeqCst), settled);
}

#[tokio::test(start_paused = true)]
async fn panicking_turn_still_stops_indicators() {
    let (_dir, ws) = workspace();
    let hub = Arc::new(ChannelHub::new());
    let telegram = Mirror::new("Telegram");
    hub.register(telegram.clone());

    let provider: Arc<dyn CompletionProvider> = Arc::new(Panicky);
    let engine = engine(&ws, provider, None).with_channels(hub);

    let reply = engine.run_channel_turn("hi", "Console", &quiet()).await;
    assert!(reply.starts_with("Error:"));
    assert_eq!(*telegram.responses.lock(), vec![reply.clone()]);

    let settled = telegram.refreshes.load(Ordering::SeqCst);
    tokio::time::sleep(BUSY_REFRESH * 4).await;
    assert_eq!(telegram.refreshes.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn status_lines_follow_dispatch() {
    let (_dir, ws) = workspace();
    let provider = Scripted::new([
        "Ok.\n<tool_code>[{\"name\":\"MEMORY_WRITE\",\"params\":{\"new_memory\":{}}}]</tool_code>",
    ]);
    let engine = engine(&ws, provider, None);
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = {
        let lines = lines.clone();
        move |line: &str| lines.lock().push(line.to_string())
    };

    engine.process("save nothing", "Console", &sink).await;

    assert_eq!(
        *lines.lock(),
        vec!["Executing agent action (MEMORY_WRITE)...".to_string()]
    );
}
