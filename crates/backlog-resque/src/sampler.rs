//! Resque backlog sampler.

use std::time::Duration;

use tracing::{debug, error};

use backlog_core::{BacklogSource, BoxFuture};

use crate::client::RespClient;

pub const DEFAULT_NAMESPACE: &str = "resque";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the Resque Redis instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResqueConfig {
    /// `host:port` of the Redis server.
    pub address: String,
    pub password: Option<String>,
    /// Key prefix, `resque` unless the app uses a custom `Resque.redis.namespace`.
    pub namespace: String,
    /// Bound on connect and on each command round-trip.
    pub timeout: Duration,
}

impl ResqueConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Counts live workers plus queued jobs in a Resque keyspace.
#[derive(Debug)]
pub struct ResqueSampler {
    client: RespClient,
    namespace: String,
}

impl ResqueSampler {
    pub fn new(config: ResqueConfig) -> Self {
        Self {
            client: RespClient::new(config.address, config.password, config.timeout),
            namespace: config.namespace,
        }
    }

    /// Check the server answers `PING`. Used for a startup diagnostic only.
    pub async fn ping(&mut self) -> bool {
        match self.client.ping().await {
            Ok(pong) => pong,
            Err(e) => {
                error!(addr = %self.client.addr(), error = %e, "redis ping failed");
                false
            }
        }
    }

    /// Workers whose heartbeat key is present.
    pub async fn count_active_jobs(&mut self) -> u64 {
        let workers_key = format!("{}:workers", self.namespace);
        let workers = match self.client.smembers(&workers_key).await {
            Ok(workers) => workers,
            Err(e) => {
                error!(key = %workers_key, error = %e, "failed to retrieve resque worker set");
                return 0;
            }
        };

        let mut jobs = 0;
        for worker in &workers {
            let key = format!("{}:worker:{worker}", self.namespace);
            match self.client.exists(&key).await {
                Ok(true) => jobs += 1,
                Ok(false) => {}
                Err(e) => error!(%key, error = %e, "failed to check resque worker"),
            }
        }
        jobs
    }

    /// Sum of queue lengths over every registered queue.
    pub async fn count_pending_jobs(&mut self) -> u64 {
        let queues_key = format!("{}:queues", self.namespace);
        let queues = match self.client.smembers(&queues_key).await {
            Ok(queues) => queues,
            Err(e) => {
                error!(key = %queues_key, error = %e, "failed to retrieve resque queue set");
                return 0;
            }
        };

        let mut jobs: u64 = 0;
        for queue in &queues {
            let key = format!("{}:queue:{queue}", self.namespace);
            match self.client.llen(&key).await {
                Ok(len) => jobs = jobs.saturating_add(len),
                Err(e) => error!(%key, error = %e, "failed to get resque queue length"),
            }
        }
        jobs
    }
}

impl BacklogSource for ResqueSampler {
    fn sample(&mut self) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let active = self.count_active_jobs().await;
            let pending = self.count_pending_jobs().await;
            debug!(active, pending, "resque backlog");
            active.saturating_add(pending)
        })
    }
}
