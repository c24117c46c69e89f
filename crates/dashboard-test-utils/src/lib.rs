//! # Dashboard Test Utilities
//!
//! Shared test utilities for the item dashboard service.
//!
//! This crate provides:
//! - Deterministic Ed25519 signing keys (`TestKeypair`)
//! - Identity token claim builders (`TestTokenBuilder`)
//! - A wiremock-backed JWKS endpoint (`JwksMock`)
//! - Router and server harnesses (`build_test_app`, `TestDashboardServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dashboard_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::new(1, "key-1")?;
//!     let jwks = JwksMock::start(&[&keypair]).await;
//!     let config = test_config(&jwks.url(), "http://127.0.0.1:1", &[])?;
//!     let server = TestDashboardServer::spawn(config).await?;
//!
//!     let token = keypair.sign(&TestTokenBuilder::new().build())?;
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_mock;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_mock::*;
pub use server_harness::*;
pub use token_builders::*;
