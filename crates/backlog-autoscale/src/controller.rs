//! Controller — the two-task scaling loop.
//!
//! The decision task owns [`ControllerState`] outright and runs
//! sample → smooth → decide on a fixed interval. Emitted decisions travel
//! one way over a capacity-1 channel to the actuation task, which calls
//! the fleet API. A slow or failing fleet API back-pressures the decision
//! task at its next emission but never delays a tick that emits nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use backlog_core::{BacklogSource, FleetApi, ScalerConfig};

use crate::actuator::Actuator;
use crate::scaler::{DecisionEngine, ScaleDecision};
use crate::smoother::Smoother;

/// Mutable loop state, owned exclusively by the decision task.
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// Last known or commanded fleet size.
    pub current_instances: u32,
    /// Trailing window of raw samples.
    pub window: Smoother,
    /// When the last decision was emitted (not the last tick).
    pub last_scale_time: Option<Instant>,
}

impl ControllerState {
    pub fn new(current_instances: u32, num_samples: usize) -> Self {
        Self {
            current_instances,
            window: Smoother::new(num_samples),
            last_scale_time: None,
        }
    }
}

/// Sampler, smoother and decision engine bound to their state.
pub struct DecisionLoop<S> {
    source: S,
    engine: DecisionEngine,
    state: ControllerState,
}

impl<S: BacklogSource> DecisionLoop<S> {
    pub fn new(config: &ScalerConfig, source: S, current_instances: u32) -> Self {
        Self {
            source,
            engine: DecisionEngine::new(config),
            state: ControllerState::new(current_instances, config.num_samples),
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Run one sampling tick.
    ///
    /// Returns the new instance count when a change is emitted. The state
    /// is updated before returning, so the caller only has to deliver it.
    pub async fn tick(&mut self) -> Option<u32> {
        let sample = self.source.sample().await;
        let current = self.state.current_instances;

        let Some(average) = self.state.window.push(sample) else {
            debug!(
                sample,
                filled = self.state.window.len(),
                window = self.state.window.capacity(),
                "sample window filling"
            );
            return None;
        };

        debug!(sample, average, current, "backlog sampled");

        let now = Instant::now();
        match self
            .engine
            .decide(average, current, now, self.state.last_scale_time)
        {
            ScaleDecision::ScaleTo(target) => {
                info!(from = current, to = target, average, "scaling decision");
                self.state.current_instances = target;
                self.state.last_scale_time = Some(now);
                Some(target)
            }
            ScaleDecision::NoChange => None,
        }
    }
}

/// Wires a backlog source and a fleet API into the running control loop.
pub struct Controller<S, F> {
    config: ScalerConfig,
    source: S,
    fleet: Arc<F>,
}

impl<S, F> Controller<S, F>
where
    S: BacklogSource + 'static,
    F: FleetApi + 'static,
{
    pub fn new(config: ScalerConfig, source: S, fleet: Arc<F>) -> Self {
        Self {
            config,
            source,
            fleet,
        }
    }

    /// Live fleet size, or `min_instances` when it cannot be read.
    pub async fn initial_instances(&self) -> u32 {
        match self.fleet.current_instances().await {
            Ok(instances) => {
                info!(instances, "read current fleet size");
                instances
            }
            Err(e) => {
                let fallback = self.config.bounds.min;
                error!(
                    error = %e,
                    fallback,
                    "unable to retrieve current instance count"
                );
                fallback
            }
        }
    }

    /// Run until the process is terminated.
    pub async fn run(self) {
        let (_, shutdown_rx) = watch::channel(false);
        self.run_until(shutdown_rx).await;
    }

    /// Run until `shutdown` reads `true`, checked at tick boundaries and
    /// at channel send/receive points. Dropping every sender without
    /// sending `true` leaves the loop running.
    pub async fn run_until(self, shutdown: watch::Receiver<bool>) {
        let initial = self.initial_instances().await;
        let interval = self.config.interval;

        info!(
            initial_instances = initial,
            min = self.config.bounds.min,
            max = self.config.bounds.max,
            workers_per_instance = self.config.workers_per_instance,
            num_samples = self.config.num_samples,
            interval_ms = interval.as_millis() as u64,
            "autoscaler started"
        );

        let decisions = DecisionLoop::new(&self.config, self.source, initial);
        let actuator = Actuator::new(self.fleet);
        let (tx, rx) = mpsc::channel(1);

        let decision_handle = tokio::spawn(decision_task(
            decisions,
            interval,
            tx,
            shutdown.clone(),
        ));
        let actuation_handle = tokio::spawn(actuation_task(actuator, rx, shutdown));

        if let Err(e) = decision_handle.await {
            error!(error = %e, "decision task aborted");
        }
        if let Err(e) = actuation_handle.await {
            error!(error = %e, "actuation task aborted");
        }

        info!("autoscaler stopped");
    }
}

/// Resolves once `shutdown` reads `true`; never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

async fn decision_task<S: BacklogSource>(
    mut decisions: DecisionLoop<S>,
    interval: Duration,
    tx: mpsc::Sender<u32>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Some(target) = decisions.tick().await {
            tokio::select! {
                sent = tx.send(target) => {
                    if sent.is_err() {
                        warn!(target, "actuation channel closed");
                        break;
                    }
                }
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    debug!("decision task exiting");
}

async fn actuation_task<F: FleetApi>(
    actuator: Actuator<F>,
    mut rx: mpsc::Receiver<u32>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(target) => actuator.apply(target).await,
                None => break,
            },
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    debug!("actuation task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use backlog_core::{BoxFuture, InstanceBounds};

    /// Replays scripted samples, repeating the last one when exhausted.
    struct ScriptedSource {
        samples: VecDeque<u64>,
        last: u64,
    }

    impl ScriptedSource {
        fn new(samples: &[u64]) -> Self {
            Self {
                samples: samples.iter().copied().collect(),
                last: 0,
            }
        }
    }

    impl BacklogSource for ScriptedSource {
        fn sample(&mut self) -> BoxFuture<'_, u64> {
            if let Some(next) = self.samples.pop_front() {
                self.last = next;
            }
            let sample = self.last;
            Box::pin(async move { sample })
        }
    }

    struct MockFleet {
        current: Option<u32>,
        resizes: Mutex<Vec<u32>>,
    }

    impl MockFleet {
        fn new(current: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                current,
                resizes: Mutex::new(Vec::new()),
            })
        }

        fn resizes(&self) -> Vec<u32> {
            self.resizes.lock().unwrap().clone()
        }
    }

    impl FleetApi for MockFleet {
        fn current_instances(&self) -> BoxFuture<'_, anyhow::Result<u32>> {
            let current = self.current;
            Box::pin(async move {
                current.ok_or_else(|| anyhow::anyhow!("fleet unreachable"))
            })
        }

        fn resize(&self, instances: u32) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.resizes.lock().unwrap().push(instances);
                Ok(())
            })
        }
    }

    fn test_config(num_samples: usize, workers_per_instance: u32) -> ScalerConfig {
        ScalerConfig {
            bounds: InstanceBounds { min: 2, max: 50 },
            workers_per_instance,
            interval: Duration::from_secs(1),
            num_samples,
            scale_up_delay: Duration::from_secs(60),
            scale_down_delay: Duration::from_secs(600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_a_then_b() {
        let config = test_config(1, 1);
        let mut decisions = DecisionLoop::new(&config, ScriptedSource::new(&[7, 1]), 2);

        assert_eq!(decisions.tick().await, Some(7));
        assert_eq!(decisions.state().current_instances, 7);
        let scaled_at = decisions.state().last_scale_time;
        assert!(scaled_at.is_some());

        // Drops to 1 immediately: scale-down delay has not elapsed.
        assert_eq!(decisions.tick().await, None);
        assert_eq!(decisions.state().current_instances, 7);
        assert_eq!(decisions.state().last_scale_time, scaled_at);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_c_waits_for_full_window() {
        let config = test_config(3, 2);
        let mut decisions = DecisionLoop::new(&config, ScriptedSource::new(&[4, 4, 4]), 5);

        assert_eq!(decisions.tick().await, None);
        assert_eq!(decisions.tick().await, None);
        assert_eq!(decisions.state().current_instances, 5);
        assert_eq!(decisions.state().last_scale_time, None);

        // avg 4 / 2 workers = 2 instances.
        assert_eq!(decisions.tick().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_desired_never_touches_last_scale_time() {
        let config = test_config(1, 1);
        let mut decisions = DecisionLoop::new(&config, ScriptedSource::new(&[5]), 5);

        for _ in 0..10 {
            assert_eq!(decisions.tick().await, None);
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(decisions.state().last_scale_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_decision_does_not_reset_delay() {
        let config = test_config(1, 1);
        let mut decisions = DecisionLoop::new(&config, ScriptedSource::new(&[10, 20, 20]), 2);

        assert_eq!(decisions.tick().await, Some(10));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(decisions.tick().await, None);

        // 60s after the emitted decision, 30s after the suppressed one.
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(decisions.tick().await, Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn scale_down_after_down_delay() {
        let config = test_config(1, 1);
        let mut decisions = DecisionLoop::new(&config, ScriptedSource::new(&[10, 3]), 2);

        assert_eq!(decisions.tick().await, Some(10));
        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(decisions.tick().await, None);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(decisions.tick().await, Some(3));
    }

    #[tokio::test]
    async fn initial_instances_reads_fleet() {
        let controller = Controller::new(
            test_config(1, 1),
            ScriptedSource::new(&[]),
            MockFleet::new(Some(9)),
        );
        assert_eq!(controller.initial_instances().await, 9);
    }

    #[tokio::test]
    async fn initial_instances_falls_back_to_min() {
        let controller = Controller::new(
            test_config(1, 1),
            ScriptedSource::new(&[]),
            MockFleet::new(None),
        );
        assert_eq!(controller.initial_instances().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_actuates_and_stops() {
        let fleet = MockFleet::new(Some(3));
        let controller = Controller::new(
            test_config(1, 1),
            ScriptedSource::new(&[3, 3, 12]),
            fleet.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.run_until(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fleet.resizes(), vec![12]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_with_unreadable_fleet_seeds_min() {
        let fleet = MockFleet::new(None);
        let controller = Controller::new(
            test_config(1, 1),
            ScriptedSource::new(&[2]),
            fleet.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.run_until(shutdown_rx));

        // Backlog of 2 equals the seeded min: nothing to do.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(fleet.resizes().is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    /// Fixed backlog that counts how often it was sampled.
    struct CountingSource {
        backlog: u64,
        ticks: Arc<AtomicUsize>,
    }

    impl BacklogSource for CountingSource {
        fn sample(&mut self) -> BoxFuture<'_, u64> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            let backlog = self.backlog;
            Box::pin(async move { backlog })
        }
    }

    /// Fleet whose resize stalls for `stall` and then fails.
    struct StallingFleet {
        stall: Duration,
        resizes: Mutex<Vec<u32>>,
        failures: AtomicUsize,
    }

    impl FleetApi for StallingFleet {
        fn current_instances(&self) -> BoxFuture<'_, anyhow::Result<u32>> {
            Box::pin(async { Ok(3) })
        }

        fn resize(&self, instances: u32) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.resizes.lock().unwrap().push(instances);
                tokio::time::sleep(self.stall).await;
                self.failures.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("500 Internal Server Error"))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_then_failed_resize_is_neither_retried_nor_rolled_back() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let fleet = Arc::new(StallingFleet {
            stall: Duration::from_secs(5),
            resizes: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
        });
        let source = CountingSource {
            backlog: 12,
            ticks: ticks.clone(),
        };
        let controller = Controller::new(test_config(1, 1), source, fleet.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.run_until(shutdown_rx));

        // Resize is still stalled; ticks carry on regardless.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert_eq!(fleet.failures.load(Ordering::SeqCst), 0);

        // Resize has failed; the loop still believes it is at 12.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 11);
        assert_eq!(fleet.failures.load(Ordering::SeqCst), 1);
        assert_eq!(*fleet.resizes.lock().unwrap(), vec![12]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_shutdown_sender_keeps_loop_running() {
        let fleet = MockFleet::new(Some(3));
        let controller = Controller::new(
            test_config(1, 1),
            ScriptedSource::new(&[3, 3, 12]),
            fleet.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        let handle = tokio::spawn(controller.run_until(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fleet.resizes(), vec![12]);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
