//! The queue primitives the broker is built on.

use std::time::Duration;

use crate::error::BrokerError;

/// A named-list store with atomic pop.
///
/// Two primitives are all the broker needs: push onto the tail of a list,
/// and a blocking pop from its head that gives up after `timeout`. Pushing
/// to a key nobody is waiting on keeps the value until someone pops it,
/// which is what lets the client arm its listener and publish in either
/// order without losing a fast response.
#[async_trait::async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Append `value` to the tail of `key`.
    async fn push(&self, key: &str, value: String) -> Result<(), BrokerError>;

    /// Pop the head of `key`, waiting up to `timeout` for one to appear.
    /// `Ok(None)` means the wait elapsed with the list still empty.
    async fn pop(&self, key: &str, timeout: Duration) -> Result<Option<String>, BrokerError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), BrokerError>;
}

/// Transport used when no queue is configured. Every operation fails, so a
/// [`BrokerClient`](crate::BrokerClient) over it waits out its full timeout
/// like any other unreachable queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredQueue;

#[async_trait::async_trait]
impl QueueTransport for UnconfiguredQueue {
    async fn push(&self, _key: &str, _value: String) -> Result<(), BrokerError> {
        Err(BrokerError::Config("broker.url is not set".into()))
    }

    async fn pop(&self, _key: &str, _timeout: Duration) -> Result<Option<String>, BrokerError> {
        Err(BrokerError::Config("broker.url is not set".into()))
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Err(BrokerError::Config("broker.url is not set".into()))
    }
}
