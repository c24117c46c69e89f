//! Operational endpoint integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use dashboard_service::errors::DashboardError;
use dashboard_service::models::{Item, ItemFields};
use dashboard_service::services::ItemStore;
use dashboard_test_utils::*;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn test_health_is_ok_without_dependencies() -> Result<()> {
    let config = test_config(
        "http://127.0.0.1:1/.well-known/jwks.json",
        "http://127.0.0.1:1",
        &[],
    )?;
    let server = TestDashboardServer::spawn(config).await?;

    let response = server
        .client()?
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");
    Ok(())
}

#[tokio::test]
async fn test_ready_when_key_set_is_reachable() -> Result<()> {
    let key = TestKeypair::new(1, "key-1")?;
    let jwks = JwksMock::start(&[&key]).await;
    let config = test_config(&jwks.url(), "http://127.0.0.1:1", &[])?;
    let server = TestDashboardServer::spawn(config).await?;

    let response = server
        .client()?
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["item_store"], "healthy");
    assert_eq!(body["jwks"], "available");
    assert_eq!(
        server.state().jwt_validator.jwks_client().cached_key_count().await,
        Some(1)
    );
    Ok(())
}

#[tokio::test]
async fn test_not_ready_when_key_set_is_unreachable() -> Result<()> {
    let key = TestKeypair::new(1, "key-1")?;
    let jwks = JwksMock::start(&[&key]).await;
    jwks.fail_with(500).await;
    let config = test_config(&jwks.url(), "http://127.0.0.1:1", &[])?;
    let server = TestDashboardServer::spawn(config).await?;

    let response = server
        .client()?
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 503);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["jwks"], "unavailable");
    assert_eq!(body["error"], "Service dependencies unavailable");

    // Recovers once the issuer answers again
    jwks.publish(&[&key]).await;
    let response = server
        .client()?
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    Ok(())
}

/// Store that is unreachable; only `ping` is exercised here.
struct UnreachableStore;

#[async_trait]
impl ItemStore for UnreachableStore {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    async fn list(&self) -> Result<Vec<Item>, DashboardError> {
        Ok(Vec::new())
    }

    async fn create(&self, _fields: ItemFields) -> Result<Item, DashboardError> {
        Err(DashboardError::Store("connection refused".to_string()))
    }

    async fn update(&self, _id: &str, _fields: ItemFields) -> Result<Option<Item>, DashboardError> {
        Ok(None)
    }

    async fn delete(&self, _id: &str) -> Result<(), DashboardError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), DashboardError> {
        Err(DashboardError::Store("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_not_ready_when_item_store_is_down() -> Result<()> {
    let key = TestKeypair::new(1, "key-1")?;
    let jwks = JwksMock::start(&[&key]).await;
    let config = test_config(&jwks.url(), "http://127.0.0.1:1", &[])?;
    let app = build_test_router(test_state_with_store(config, Arc::new(UnreachableStore))?);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = response.into_body().collect().await?.to_bytes();
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["item_store"], "unhealthy");
    assert!(!bytes.windows(18).any(|w| w == b"connection refused"));
    // Store checked first, so the key set is never fetched
    assert_eq!(jwks.fetch_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let config = test_config(
        "http://127.0.0.1:1/.well-known/jwks.json",
        "http://127.0.0.1:1",
        &[],
    )?;
    let server = TestDashboardServer::spawn(config).await?;

    let response = server
        .client()?
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    Ok(())
}
