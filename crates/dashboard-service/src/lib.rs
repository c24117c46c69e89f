//! Item Dashboard Service Library
//!
//! An HTTP service that serves a small CRUD item dashboard behind a
//! request-authorization gate:
//!
//! - Credential verification against the identity provider's JWKS
//! - Public/protected route policy with API (401 JSON) and page (303 to
//!   login) denial surfaces
//! - Credential issuance endpoints proxied to the identity provider
//! - Item API backed by an in-memory or Redis store
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/gate.rs -> handlers/*.rs -> services/*.rs
//!                         |
//!                  auth/jwt.rs -> auth/jwks.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification and the JWKS key resolver
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization gate and HTTP metrics
//! - `models` - Wire types
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Item stores and the identity provider client

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
