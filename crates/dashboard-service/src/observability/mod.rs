//! Observability for the dashboard service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
