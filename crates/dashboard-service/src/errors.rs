//! Dashboard service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. The body
//! is always `{"error": "<message>"}`, the shape the browser client reads.
//! Messages returned to clients are generic for server-side failures; the
//! underlying cause is logged instead.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Value of the `WWW-Authenticate` header on every 401.
pub const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"dashboard\", error=\"invalid_token\"";

/// Dashboard service error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401
/// - BadRequest: 400
/// - NotFound: 404
/// - Store, Internal: 500
/// - ServiceUnavailable: 503
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Missing or rejected credential, or identity provider refused the login.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Item store backend failure. The detail is logged, never returned.
    #[error("Item store error: {0}")]
    Store(String),

    /// A dependency (identity provider, key set issuer) could not be reached.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl DashboardError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            DashboardError::Unauthorized(_) => 401,
            DashboardError::BadRequest(_) => 400,
            DashboardError::NotFound(_) => 404,
            DashboardError::Store(_) | DashboardError::Internal => 500,
            DashboardError::ServiceUnavailable(_) => 503,
        }
    }
}

/// Why a credential was rejected by the authorization gate.
///
/// Every variant except `Missing` renders as "invalid credential"; the
/// distinction is kept for logging and metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No token in the cookie or the Authorization header.
    #[error("missing credential")]
    Missing,

    /// Token does not parse into the expected structure.
    #[error("invalid credential")]
    Malformed,

    /// Key id absent from the key set, even after a refresh attempt.
    #[error("invalid credential")]
    UnknownKey,

    /// Signature does not verify, or the header algorithm disagrees with the key.
    #[error("invalid credential")]
    SignatureMismatch,

    /// `iss` differs from the configured issuer.
    #[error("invalid credential")]
    IssuerMismatch,

    /// `exp` is in the past.
    #[error("invalid credential")]
    Expired,

    /// `iat` is further in the future than the allowed clock skew.
    #[error("invalid credential")]
    IssuedInFuture,

    /// The key set document could not be fetched or parsed.
    #[error("invalid credential")]
    KeySetFetch,
}

impl CredentialError {
    /// Bounded label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CredentialError::Missing => "missing",
            CredentialError::Malformed => "malformed",
            CredentialError::UnknownKey => "unknown_key",
            CredentialError::SignatureMismatch => "signature_mismatch",
            CredentialError::IssuerMismatch => "issuer_mismatch",
            CredentialError::Expired => "expired",
            CredentialError::IssuedInFuture => "issued_in_future",
            CredentialError::KeySetFetch => "key_set_fetch",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            DashboardError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason),
            DashboardError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            DashboardError::NotFound(reason) => (StatusCode::NOT_FOUND, reason),
            DashboardError::Store(err) => {
                tracing::error!(target: "dashboard.items", error = %err, "Item store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal storage error occurred".to_string(),
                )
            }
            DashboardError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "dashboard.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            DashboardError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DashboardError::Unauthorized("Unauthorized".to_string()).to_string(),
            "Unauthorized: Unauthorized"
        );
        assert_eq!(
            DashboardError::NotFound("item".to_string()).to_string(),
            "Not found: item"
        );
        assert_eq!(DashboardError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DashboardError::Unauthorized("x".to_string()).status_code(), 401);
        assert_eq!(DashboardError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(DashboardError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(DashboardError::Store("x".to_string()).status_code(), 500);
        assert_eq!(
            DashboardError::ServiceUnavailable("x".to_string()).status_code(),
            503
        );
        assert_eq!(DashboardError::Internal.status_code(), 500);
    }

    #[test]
    fn test_credential_error_messages() {
        assert_eq!(CredentialError::Missing.to_string(), "missing credential");
        for err in [
            CredentialError::Malformed,
            CredentialError::UnknownKey,
            CredentialError::SignatureMismatch,
            CredentialError::IssuerMismatch,
            CredentialError::Expired,
            CredentialError::IssuedInFuture,
            CredentialError::KeySetFetch,
        ] {
            assert_eq!(err.to_string(), "invalid credential", "{err:?}");
        }
        assert_eq!(CredentialError::UnknownKey.reason(), "unknown_key");
    }

    #[tokio::test]
    async fn test_into_response_unauthorized() {
        let response = DashboardError::Unauthorized("Unauthorized".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"dashboard\""));

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_into_response_bad_request_passes_message() {
        let response =
            DashboardError::BadRequest("Name and description are required".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], "Name and description are required");
    }

    #[tokio::test]
    async fn test_into_response_store_error_is_generic() {
        let response =
            DashboardError::Store("connection refused to 10.0.0.5".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], "An internal storage error occurred");
    }

    #[tokio::test]
    async fn test_into_response_service_unavailable_is_generic() {
        let response =
            DashboardError::ServiceUnavailable("identity provider timeout".to_string())
                .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"], "Service temporarily unavailable");
    }
}
