//! The router daemon: serves remote capabilities from the shared command
//! queue, and optionally hosts the queue hub itself.

pub mod capabilities;
pub mod cli;

use sc_broker::RemoteRegistry;

/// Every capability this router can serve.
pub fn registry() -> RemoteRegistry {
    let mut registry = RemoteRegistry::new();
    registry.register(
        capabilities::hello_world::TYPE_NAME,
        capabilities::hello_world::HelloWorldCapability,
    );
    registry
}
