//! In-process queue store. Backs the hub server and the test suites.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use sc_protocol::RESPONSE_PREFIX;

use crate::error::BrokerError;
use crate::transport::QueueTransport;

/// How long a response key outlives its last push when nobody pops it.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct List {
    values: VecDeque<String>,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Lists {
    by_key: HashMap<String, List>,
    /// Bumped on every change, so snapshots can be ordered.
    version: u64,
}

/// Keys starting with `prefix` are dropped `ttl` after their last push.
struct Expiry {
    prefix: String,
    ttl: Duration,
}

pub struct MemoryQueue {
    lists: Mutex<Lists>,
    /// Woken on every push; waiters re-check their own key.
    pushed: Notify,
    expiry: Option<Expiry>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self {
            lists: Mutex::new(Lists::default()),
            pushed: Notify::new(),
            expiry: Some(Expiry {
                prefix: RESPONSE_PREFIX.into(),
                ttl: DEFAULT_RESPONSE_TTL,
            }),
        }
    }
}

impl MemoryQueue {
    /// A queue whose response keys expire after [`DEFAULT_RESPONSE_TTL`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot produced by [`MemoryQueue::snapshot`].
    pub fn from_snapshot(snapshot: BTreeMap<String, Vec<String>>) -> Self {
        let by_key = snapshot
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| {
                let list = List {
                    values: values.into_iter().collect(),
                    expires_at: None,
                };
                (key, list)
            })
            .collect();
        Self {
            lists: Mutex::new(Lists { by_key, version: 0 }),
            ..Self::default()
        }
    }

    /// Expire keys starting with `prefix` once `ttl` has passed since their
    /// last push. Keys already held start their clock now.
    pub fn with_expiry(mut self, prefix: impl Into<String>, ttl: Duration) -> Self {
        let prefix = prefix.into();
        let deadline = Instant::now() + ttl;
        for (key, list) in self.lists.get_mut().by_key.iter_mut() {
            list.expires_at = key.starts_with(&prefix).then_some(deadline);
        }
        self.expiry = Some(Expiry { prefix, ttl });
        self
    }

    /// Keep every key until it is popped.
    pub fn without_expiry(mut self) -> Self {
        for list in self.lists.get_mut().by_key.values_mut() {
            list.expires_at = None;
        }
        self.expiry = None;
        self
    }

    pub fn push_back(&self, key: &str, value: String) {
        {
            let mut lists = self.lists.lock();
            let expires_at = self
                .expiry
                .as_ref()
                .filter(|e| key.starts_with(&e.prefix))
                .map(|e| Instant::now() + e.ttl);
            let list = lists.by_key.entry(key.to_string()).or_default();
            list.values.push_back(value);
            list.expires_at = expires_at;
            lists.version += 1;
        }
        self.pushed.notify_waiters();
    }

    /// Non-blocking pop. Drained lists are dropped.
    pub fn try_pop(&self, key: &str) -> Option<String> {
        let mut lists = self.lists.lock();
        reap_locked(&mut lists);
        let list = lists.by_key.get_mut(key)?;
        let value = list.values.pop_front();
        if list.values.is_empty() {
            lists.by_key.remove(key);
        }
        if value.is_some() {
            lists.version += 1;
        }
        value
    }

    /// Pop the head of `key`, waiting until `timeout` elapses.
    pub async fn pop_wait(&self, key: &str, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if let Some(value) = self.try_pop(key) {
                return Some(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop(key);
            }
        }
    }

    /// Drop expired keys. Returns how many were removed.
    pub fn reap(&self) -> usize {
        reap_locked(&mut self.lists.lock())
    }

    pub fn len(&self, key: &str) -> usize {
        let mut lists = self.lists.lock();
        reap_locked(&mut lists);
        lists.by_key.get(key).map_or(0, |l| l.values.len())
    }

    pub fn is_empty(&self) -> bool {
        let mut lists = self.lists.lock();
        reap_locked(&mut lists);
        lists.by_key.is_empty()
    }

    /// Every key currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut lists = self.lists.lock();
        reap_locked(&mut lists);
        let mut keys: Vec<String> = lists.by_key.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of every non-empty list, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.versioned_snapshot().1
    }

    /// [`MemoryQueue::snapshot`] plus the version it was taken at. A higher
    /// version is always a later state.
    pub fn versioned_snapshot(&self) -> (u64, BTreeMap<String, Vec<String>>) {
        let mut lists = self.lists.lock();
        reap_locked(&mut lists);
        let copy = lists
            .by_key
            .iter()
            .map(|(key, list)| (key.clone(), list.values.iter().cloned().collect()))
            .collect();
        (lists.version, copy)
    }
}

fn reap_locked(lists: &mut Lists) -> usize {
    let now = Instant::now();
    let before = lists.by_key.len();
    lists
        .by_key
        .retain(|_, list| list.expires_at.map_or(true, |at| at > now));
    let removed = before - lists.by_key.len();
    if removed > 0 {
        lists.version += 1;
        tracing::debug!(removed, "expired queue keys dropped");
    }
    removed
}

#[async_trait::async_trait]
impl QueueTransport for MemoryQueue {
    async fn push(&self, key: &str, value: String) -> Result<(), BrokerError> {
        self.push_back(key, value);
        Ok(())
    }

    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
        Ok(self.pop_wait(key, timeout).await)
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
