//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via `tracing`
//! - OpenTelemetry metrics for flush activity

pub mod metrics;
pub mod tracing;
