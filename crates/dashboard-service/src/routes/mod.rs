//! HTTP routes for the dashboard service.
//!
//! Defines the Axum router and application state.

use crate::auth::JwtValidator;
use crate::config::Config;
use crate::errors::DashboardError;
use crate::handlers;
use crate::middleware::{authorize_request, http_metrics_middleware, GateState, RoutePolicy};
use crate::services::{IdentityClient, ItemStore};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Item persistence backend.
    pub item_store: Arc<dyn ItemStore>,

    /// Identity provider client for the credential endpoints.
    pub identity: Arc<dyn IdentityClient>,

    /// Token verifier shared with the authorization gate.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready`, `/metrics` - operational probes (public)
/// - `/api/auth/{signup,confirm,login,logout}` - credential endpoints (public)
/// - `/api/items`, `/api/items/:id`, `/api/me` - JSON API (protected)
/// - `/`, `/dashboard` - pages (protected); `/login`, `/signup`, `/confirm` (public)
/// - Authorization gate around every route, including the fallback
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let gate_state = Arc::new(GateState::new(
        state.jwt_validator.clone(),
        RoutePolicy::default(),
        state.config.id_token_cookie.clone(),
        state.config.login_path.clone(),
    ));

    let app_routes = Router::new()
        // Operational endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Credential endpoints
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/confirm", post(handlers::confirm))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        // Item API
        .route(
            "/api/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/api/items/:id",
            put(handlers::update_item).delete(handlers::delete_item),
        )
        .route("/api/me", get(handlers::get_me))
        // Pages
        .route("/", get(handlers::root_redirect))
        .route("/dashboard", get(handlers::dashboard_page))
        .route("/login", get(handlers::login_page))
        .route("/signup", get(handlers::signup_page))
        .route("/confirm", get(handlers::confirm_page))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. authorize_request - gate, runs before any handler or the fallback
    // 2. TimeoutLayer
    // 3. TraceLayer
    // 4. http_metrics_middleware - records ALL responses, gate denials included
    app_routes
        .merge(metrics_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(gate_state, authorize_request))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

async fn not_found() -> DashboardError {
    DashboardError::NotFound("Not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_app_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppState>();
    }
}
