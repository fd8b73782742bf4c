//! Actuator — applies scaling decisions to the fleet.
//!
//! Fire-and-forget: a failed resize is logged and dropped. The next
//! warranted decision is the only form of retry.

use std::sync::Arc;

use tracing::{error, info};

use backlog_core::FleetApi;

/// Calls the fleet "resize" capability for each decision it is handed.
pub struct Actuator<F> {
    fleet: Arc<F>,
}

impl<F: FleetApi> Actuator<F> {
    pub fn new(fleet: Arc<F>) -> Self {
        Self { fleet }
    }

    /// Request a resize to `instances`. Never fails.
    pub async fn apply(&self, instances: u32) {
        info!(instances, "scaling fleet");
        if let Err(e) = self.fleet.resize(instances).await {
            error!(instances, error = %e, "scaling action failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use backlog_core::BoxFuture;

    #[derive(Default)]
    struct RecordingFleet {
        resizes: Mutex<Vec<u32>>,
        fail: bool,
    }

    impl FleetApi for RecordingFleet {
        fn current_instances(&self) -> BoxFuture<'_, anyhow::Result<u32>> {
            Box::pin(async { Ok(1) })
        }

        fn resize(&self, instances: u32) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.resizes.lock().unwrap().push(instances);
                if self.fail {
                    anyhow::bail!("503 Service Unavailable");
                }
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn apply_forwards_count() {
        let fleet = Arc::new(RecordingFleet::default());
        let actuator = Actuator::new(fleet.clone());

        actuator.apply(7).await;
        actuator.apply(3).await;

        assert_eq!(*fleet.resizes.lock().unwrap(), vec![7, 3]);
    }

    #[tokio::test]
    async fn apply_swallows_failures() {
        let fleet = Arc::new(RecordingFleet {
            fail: true,
            ..Default::default()
        });
        let actuator = Actuator::new(fleet.clone());

        // Must not panic or retry.
        actuator.apply(5).await;

        assert_eq!(*fleet.resizes.lock().unwrap(), vec![5]);
    }
}
