//! Health check handlers.
//!
//! - `/health`: liveness, returns OK while the process runs
//! - `/ready`: readiness, checks the item store and the issuer's key set

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Generic readiness failure message; the cause is logged, never returned.
const DEPENDENCIES_UNAVAILABLE: &str = "Service dependencies unavailable";

/// Liveness probe handler.
///
/// Does not check dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when:
///
/// 1. The item store answers a ping
/// 2. The key resolver holds or can fetch a key set
///
/// and 503 otherwise.
#[tracing::instrument(skip_all, name = "dashboard.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.item_store.ping().await {
        tracing::warn!(target: "dashboard.items", error = %e, "Readiness check failed: item store unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                item_store: Some("unhealthy"),
                jwks: None,
                error: Some(DEPENDENCIES_UNAVAILABLE.to_string()),
            }),
        );
    }

    if let Err(e) = state.jwt_validator.jwks_client().ensure_loaded().await {
        tracing::warn!(
            target: "dashboard.auth.jwks",
            reason = e.reason(),
            "Readiness check failed: key set unavailable"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                item_store: Some("healthy"),
                jwks: Some("unavailable"),
                error: Some(DEPENDENCIES_UNAVAILABLE.to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            item_store: Some("healthy"),
            jwks: Some("available"),
            error: None,
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[test]
    fn test_readiness_response_serialization() {
        let ready = ReadinessResponse {
            status: "ready",
            item_store: Some("healthy"),
            jwks: Some("available"),
            error: None,
        };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["item_store"], "healthy");
        assert!(json.get("error").is_none());

        let not_ready = ReadinessResponse {
            status: "not_ready",
            item_store: Some("unhealthy"),
            jwks: None,
            error: Some(DEPENDENCIES_UNAVAILABLE.to_string()),
        };
        let json = serde_json::to_value(&not_ready).unwrap();
        assert_eq!(json["status"], "not_ready");
        assert!(json.get("jwks").is_none());
        assert_eq!(json["error"], DEPENDENCIES_UNAVAILABLE);
    }
}
