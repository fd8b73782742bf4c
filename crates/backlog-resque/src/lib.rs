//! backlog-resque — measures Resque backlog in Redis.
//!
//! Speaks a minimal subset of the Redis RESP2 protocol directly over a
//! tokio TCP stream; only the four commands the sampler needs plus
//! `AUTH` and `PING` are ever issued.
//!
//! # Keyspace
//!
//! ```text
//! SMEMBERS <ns>:workers          → registered worker ids
//! EXISTS   <ns>:worker:<id>      → 1 while the worker holds a job
//! SMEMBERS <ns>:queues           → registered queue names
//! LLEN     <ns>:queue:<name>     → pending jobs in that queue
//! ```
//!
//! Backlog = live workers + Σ queue lengths. Any failed lookup is logged
//! and contributes zero, so an unhealthy Redis understates the backlog
//! rather than stalling the control loop.

pub mod client;
pub mod error;
pub mod resp;
pub mod sampler;

pub use client::RespClient;
pub use error::{RespError, RespResult};
pub use resp::RespValue;
pub use sampler::{ResqueConfig, ResqueSampler};
