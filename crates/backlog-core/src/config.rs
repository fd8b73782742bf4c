//! Scaler configuration.
//!
//! Loaded once at startup and never mutated. [`ScalerConfig::validate`]
//! must pass before the control loop is constructed.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MIN_INSTANCES: u32 = 2;
pub const DEFAULT_MAX_INSTANCES: u32 = 50;
pub const DEFAULT_WORKERS_PER_INSTANCE: u32 = 1;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_NUM_SAMPLES: usize = 1;
pub const DEFAULT_SCALE_UP_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_SCALE_DOWN_DELAY: Duration = Duration::from_secs(600);

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invariant violations in a [`ScalerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("min instances must be greater than zero")]
    ZeroMinInstances,

    #[error("min instances ({min}) exceeds max instances ({max})")]
    MinAboveMax { min: u32, max: u32 },

    #[error("workers per instance must be at least 1")]
    ZeroWorkersPerInstance,

    #[error("sample window size must be at least 1")]
    ZeroSamples,

    #[error("sampling interval must be non-zero")]
    ZeroInterval,
}

/// Inclusive lower/upper clamp on the instance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBounds {
    pub min: u32,
    pub max: u32,
}

impl InstanceBounds {
    /// Constrain `instances` to `[min, max]`.
    pub fn clamp(&self, instances: u32) -> u32 {
        instances.max(self.min).min(self.max)
    }

    /// Whether `instances` lies inside the bounds.
    pub fn contains(&self, instances: u32) -> bool {
        (self.min..=self.max).contains(&instances)
    }
}

impl Default for InstanceBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_INSTANCES,
            max: DEFAULT_MAX_INSTANCES,
        }
    }
}

/// Operator-set tuning for the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalerConfig {
    pub bounds: InstanceBounds,
    /// Divisor converting a job count into an instance count.
    pub workers_per_instance: u32,
    /// Tick period of the sampling loop.
    pub interval: Duration,
    /// Length of the trailing smoothing window.
    pub num_samples: usize,
    /// Minimum time since the last emitted decision before scaling up.
    pub scale_up_delay: Duration,
    /// Minimum time since the last emitted decision before scaling down.
    pub scale_down_delay: Duration,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            bounds: InstanceBounds::default(),
            workers_per_instance: DEFAULT_WORKERS_PER_INSTANCE,
            interval: DEFAULT_INTERVAL,
            num_samples: DEFAULT_NUM_SAMPLES,
            scale_up_delay: DEFAULT_SCALE_UP_DELAY,
            scale_down_delay: DEFAULT_SCALE_DOWN_DELAY,
        }
    }
}

impl ScalerConfig {
    /// Check every invariant, reporting the first violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bounds.min == 0 {
            return Err(ConfigError::ZeroMinInstances);
        }
        if self.bounds.min > self.bounds.max {
            return Err(ConfigError::MinAboveMax {
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        if self.workers_per_instance == 0 {
            return Err(ConfigError::ZeroWorkersPerInstance);
        }
        if self.num_samples == 0 {
            return Err(ConfigError::ZeroSamples);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}
