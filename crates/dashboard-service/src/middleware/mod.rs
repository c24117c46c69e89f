//! Middleware for the dashboard service.
//!
//! # Components
//!
//! - `gate` - authorization gate applied to every request
//! - `http_metrics` - HTTP request metrics

pub mod gate;
pub mod http_metrics;

pub use gate::{authorize_request, GateDecision, GateState, RouteClass, RoutePolicy};
pub use http_metrics::http_metrics_middleware;
