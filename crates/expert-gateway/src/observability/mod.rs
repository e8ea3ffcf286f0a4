//! Observability for the Expert Gateway.
//!
//! Prometheus metrics are recorded through the `metrics` facade and exposed
//! on `/metrics`. Logging uses `tracing` and is configured in `main`.

pub mod metrics;
