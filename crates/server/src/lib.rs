//! HTTP adapter for the transmute job service.
//!
//! Exposes upload and status endpoints over the core orchestrator, plus
//! health, configuration and Prometheus metrics.

pub mod api;
pub mod metrics;
pub mod state;
