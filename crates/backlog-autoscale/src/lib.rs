//! backlog-autoscale — backlog-driven fleet sizing.
//!
//! Samples the job backlog on a fixed interval, smooths it over a trailing
//! window, and emits bounded scaling decisions gated by asymmetric
//! up/down delays to prevent flapping.
//!
//! # Scaling Algorithm
//!
//! ```text
//! sample  = active jobs + pending jobs
//! average = mean(last num_samples samples)        // not ready until full
//! desired = clamp(ceil(average / workers_per_instance), min, max)
//!
//! if desired > current and now >= last_scale + scale_up_delay:
//!     ScaleTo(desired)
//! if desired < current and now >= last_scale + scale_down_delay:
//!     ScaleTo(desired)
//! ```
//!
//! `last_scale` advances only when a decision is emitted, so a noisy
//! average hovering around a threshold never resets the delay clock.
//!
//! # Tasks
//!
//! ```text
//! decision task ──(mpsc, capacity 1)──▶ actuation task
//!   BacklogSource::sample               FleetApi::resize
//!   Smoother::push
//!   DecisionEngine::decide
//! ```

pub mod actuator;
pub mod controller;
pub mod scaler;
pub mod smoother;

pub use actuator::Actuator;
pub use controller::{Controller, ControllerState, DecisionLoop};
pub use scaler::{DecisionEngine, ScaleDecision};
pub use smoother::Smoother;
