//! # Middleware
//!
//! Request counting for the Prometheus exporter.

pub mod metrics;
