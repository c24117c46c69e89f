//! Test server harness for router and E2E testing
//!
//! - [`build_test_app`] returns the real router for in-process
//!   `tower::ServiceExt::oneshot` tests
//! - [`TestDashboardServer`] serves it on `127.0.0.1:0` for HTTP tests

use crate::token_builders::TEST_ISSUER;
use axum::Router;
use dashboard_service::auth::{JwksClient, JwtValidator};
use dashboard_service::config::Config;
use dashboard_service::routes::{self, AppState};
use dashboard_service::services::{CognitoIdentityClient, ItemStore, MemoryItemStore};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const TEST_USER_POOL_ID: &str = "us-east-1_TestPool";

/// Configuration pointing at the given JWKS and identity endpoints.
///
/// `extra` overrides or adds environment variables.
pub fn test_config(
    jwks_url: &str,
    identity_endpoint: &str,
    extra: &[(&str, &str)],
) -> Result<Config, anyhow::Error> {
    let mut vars = HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("COGNITO_USER_POOL_ID".to_string(), TEST_USER_POOL_ID.to_string()),
        ("COGNITO_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        ("COGNITO_ENDPOINT".to_string(), identity_endpoint.to_string()),
        ("TOKEN_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("JWKS_URL".to_string(), jwks_url.to_string()),
    ]);
    for (name, value) in extra {
        vars.insert((*name).to_string(), (*value).to_string());
    }

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Prometheus handle that is not installed as the global recorder.
pub fn test_metrics_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Application state with an in-memory item store.
pub fn test_state(config: Config) -> Result<Arc<AppState>, anyhow::Error> {
    let item_store: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::new());
    test_state_with_store(config, item_store)
}

/// Application state with a caller-supplied item store.
pub fn test_state_with_store(
    config: Config,
    item_store: Arc<dyn ItemStore>,
) -> Result<Arc<AppState>, anyhow::Error> {
    let identity = CognitoIdentityClient::new(
        config.identity_endpoint.clone(),
        config.client_id.clone(),
        config.client_secret.clone(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to create identity client: {}", e))?;

    let jwks_client = Arc::new(JwksClient::with_cache_policy(
        config.jwks_url.clone(),
        config.jwks_refresh_cooldown,
        config.jwks_max_age,
    ));
    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        config.token_issuer.clone(),
        config.jwt_clock_skew_seconds,
    ));

    Ok(Arc::new(AppState {
        config,
        item_store,
        identity: Arc::new(identity),
        jwt_validator,
    }))
}

/// The production router over the given state.
pub fn build_test_router(state: Arc<AppState>) -> Router {
    routes::build_routes(state, test_metrics_handle())
}

/// Router plus its state, with an in-memory item store.
pub fn build_test_app(config: Config) -> Result<(Router, Arc<AppState>), anyhow::Error> {
    let state = test_state(config)?;
    Ok((build_test_router(state.clone()), state))
}

/// Test harness serving the dashboard on a random local port.
pub struct TestDashboardServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestDashboardServer {
    /// Spawn a server with an in-memory item store.
    pub async fn spawn(config: Config) -> Result<Self, anyhow::Error> {
        let state = test_state(config)?;
        let app = build_test_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// HTTP client that does not follow redirects, so 303s stay observable.
    pub fn client(&self) -> Result<reqwest::Client, anyhow::Error> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build client: {}", e))
    }
}

impl Drop for TestDashboardServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
