//! backlog-core — shared types for the backlog autoscaler.
//!
//! Holds the immutable [`ScalerConfig`] with its validation rules, and the
//! two capability traits the control loop is written against:
//!
//! - [`BacklogSource`]: how much unfinished work is there right now?
//! - [`FleetApi`]: reads the fleet size and resizes the fleet.
//!
//! Concrete backends live in their own crates (`backlog-resque`,
//! `backlog-render`) so the decision loop can be tested against mocks.

pub mod capability;
pub mod config;

pub use capability::{BacklogSource, BoxFuture, FleetApi};
pub use config::{ConfigError, ConfigResult, InstanceBounds, ScalerConfig};
