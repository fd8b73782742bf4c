//! Decision engine — turns a smoothed backlog into a scaling decision.
//!
//! Converts the window average into a desired instance count, clamps it
//! to the configured bounds, and applies the up/down delay guards. The
//! engine itself holds no mutable state: the caller owns
//! `last_scale_time` and advances it only when a decision is emitted.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use backlog_core::{InstanceBounds, ScalerConfig};

/// Outcome of a single evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Scale to the specified instance count.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// Pure evaluation of `(average, current, now, last_scale_time)` against
/// the scaler config.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    bounds: InstanceBounds,
    workers_per_instance: u32,
    scale_up_delay: Duration,
    scale_down_delay: Duration,
}

impl DecisionEngine {
    pub fn new(config: &ScalerConfig) -> Self {
        Self {
            bounds: config.bounds,
            workers_per_instance: config.workers_per_instance.max(1),
            scale_up_delay: config.scale_up_delay,
            scale_down_delay: config.scale_down_delay,
        }
    }

    /// Instance count needed for `average` jobs, clamped to the bounds.
    pub fn desired_instances(&self, average: f64) -> u32 {
        // Float-to-int `as` saturates and maps NaN to 0.
        let raw = (average / f64::from(self.workers_per_instance)).ceil() as u32;
        self.bounds.clamp(raw)
    }

    /// Evaluate the smoothed backlog against the current fleet size.
    ///
    /// `last_scale_time` is `None` when nothing has been emitted yet, which
    /// satisfies both delay guards.
    pub fn decide(
        &self,
        average: f64,
        current: u32,
        now: Instant,
        last_scale_time: Option<Instant>,
    ) -> ScaleDecision {
        let desired = self.desired_instances(average);

        let delay = match desired.cmp(&current) {
            std::cmp::Ordering::Equal => return ScaleDecision::NoChange,
            std::cmp::Ordering::Greater => self.scale_up_delay,
            std::cmp::Ordering::Less => self.scale_down_delay,
        };

        if !delay_elapsed(now, last_scale_time, delay) {
            debug!(
                from = current,
                to = desired,
                average,
                delay_secs = delay.as_secs_f64(),
                "scaling suppressed, delay not elapsed"
            );
            return ScaleDecision::NoChange;
        }

        ScaleDecision::ScaleTo(desired)
    }
}

fn delay_elapsed(now: Instant, last_scale_time: Option<Instant>, delay: Duration) -> bool {
    match last_scale_time {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= delay,
    }
}
