//! `sc-broker`: queue-mediated RPC between the agent and router workers.
//!
//! ```text
//!   agent (BrokerClient)                      router (BrokerServer)
//!   ────────────────────                      ─────────────────────
//!   1. message_id = uuid4
//!   2. arm pop(response:<id>, timeout)
//!   3. push(command_queue, {id, action, params}) ──►  pop(command_queue, poll)
//!                                                     enable policy → skipped
//!                                                     ACTION_NAME → ActionNameCapability
//!                                                     execute (panic-safe)
//!   4. ◄──────────────── push(response:<id>, {status, action, ...payload})
//! ```
//!
//! The two sides never talk directly. Anything implementing
//! [`QueueTransport`] can carry the traffic: [`MemoryQueue`] in-process, or
//! [`HttpQueue`] against the [`hub`] server.
//!
//! Delivery is at-most-once and best-effort: a worker that dies mid-command
//! leaves the caller to time out, and the command is not redelivered.

pub mod capability;
pub mod client;
pub mod error;
pub mod http;
pub mod hub;
pub mod memory;
pub mod server;
pub mod transport;

pub use capability::{
    action_name_for, capability_type_name, CapabilityContext, RemoteCapability, RemoteRegistry,
};
pub use client::BrokerClient;
pub use error::{BrokerError, CapabilityError, CapabilityResult};
pub use http::HttpQueue;
pub use memory::MemoryQueue;
pub use server::BrokerServer;
pub use transport::{QueueTransport, UnconfiguredQueue};
