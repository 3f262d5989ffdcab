//! Metrics export.
//!
//! Pushes per-host assessment gauges to a Prometheus Push Gateway.

pub mod prom;
