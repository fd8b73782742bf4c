//! backlog-render — Render fleet-management client.
//!
//! Implements [`backlog_core::FleetApi`] against the Render REST API:
//!
//! ```text
//! GET  /services/{id}         → serviceDetails.numInstances
//! POST /services/{id}/scale   {"numInstances": n}  → 202 Accepted
//! ```

pub mod client;
pub mod error;

pub use client::{RenderClient, RenderConfig};
pub use error::{RenderError, RenderResult};
