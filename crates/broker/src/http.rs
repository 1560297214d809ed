//! HTTP client for the queue hub (see [`crate::hub`]).

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::transport::QueueTransport;

/// Extra time allowed on top of a blocking pop before the HTTP request
/// itself is abandoned.
const POP_GRACE: Duration = Duration::from_secs(5);

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PushBody {
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PopBody {
    pub value: String,
}

pub struct HttpQueue {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQueue {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BrokerError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BrokerError::Config("queue hub url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn queue_url(&self, key: &str) -> String {
        format!("{}/v1/queues/{key}", self.base_url)
    }
}

#[async_trait::async_trait]
impl QueueTransport for HttpQueue {
    async fn push(&self, key: &str, value: String) -> Result<(), BrokerError> {
        let resp = self
            .client
            .post(self.queue_url(key))
            .timeout(PUSH_TIMEOUT)
            .json(&PushBody { value })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Transport(format!(
                "push to {key} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>, BrokerError> {
        let timeout_ms = timeout.as_millis().to_string();
        let resp = self
            .client
            .post(format!("{}/pop", self.queue_url(key)))
            .query(&[("timeout_ms", timeout_ms.as_str())])
            .timeout(timeout + POP_GRACE)
            .send()
            .await?;
        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body: PopBody = resp.json().await?;
                Ok(Some(body.value))
            }
            status => Err(BrokerError::Transport(format!(
                "pop from {key} returned {status}"
            ))),
        }
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(PUSH_TIMEOUT)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BrokerError::Transport(format!(
                "health check returned {}",
                resp.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_is_a_config_error() {
        assert!(matches!(HttpQueue::new(""), Err(BrokerError::Config(_))));
        assert!(matches!(HttpQueue::new(" / "), Err(BrokerError::Config(_))));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let q = HttpQueue::new("http://127.0.0.1:6390/").unwrap();
        assert_eq!(q.base_url(), "http://127.0.0.1:6390");
        assert_eq!(
            q.queue_url("safeclaw:command_queue"),
            "http://127.0.0.1:6390/v1/queues/safeclaw:command_queue"
        );
    }
}
