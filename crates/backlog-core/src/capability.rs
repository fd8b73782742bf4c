//! Collaborator capabilities consumed by the control loop.

use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by capability methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Measures the current backlog of unfinished work.
///
/// Implementations must never fail: a backend error degrades the sample
/// toward an undercount and is logged by the implementation.
pub trait BacklogSource: Send {
    /// Total unfinished work items (active + pending) at this instant.
    fn sample(&mut self) -> BoxFuture<'_, u64>;
}

/// Reads and resizes the worker fleet.
pub trait FleetApi: Send + Sync {
    /// Current live instance count as reported by the fleet manager.
    fn current_instances(&self) -> BoxFuture<'_, anyhow::Result<u32>>;

    /// Request the fleet be resized to `instances`.
    fn resize(&self, instances: u32) -> BoxFuture<'_, anyhow::Result<()>>;
}
