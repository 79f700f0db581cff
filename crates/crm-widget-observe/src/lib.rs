//! Observability for the CRM chat widget: tracing subscriber setup with
//! optional OpenTelemetry span export.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
