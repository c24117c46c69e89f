//! Authorization gate.
//!
//! Runs once per inbound request, before routing:
//!
//! 1. Classify the path. Public prefixes pass through with no credential check.
//! 2. Extract the credential: the id token cookie, else `Authorization: Bearer`.
//! 3. Verify it (`JwtValidator`); the key set may be fetched here.
//! 4. Allow with `Claims` in the request extensions, or deny.
//!
//! Denials on the API surface (`/api/...`) are `401` JSON; denials on pages
//! redirect to the login page. Every failure denies; nothing is cached
//! between requests except the key set.
//!
//! # Security
//!
//! - Public prefixes match whole path segments (`/loginx` is protected)
//! - Tokens never appear in logs; only the failure kind is recorded

use crate::auth::{Claims, CredentialError, JwtValidator};
use crate::errors::DashboardError;
use crate::observability::metrics::record_gate_decision;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// Paths reachable without a credential.
pub const DEFAULT_PUBLIC_PREFIXES: [&str; 9] = [
    "/login",
    "/signup",
    "/confirm",
    "/api/auth",
    "/static",
    "/favicon.ico",
    "/health",
    "/ready",
    "/metrics",
];

/// Namespace whose denials are answered with JSON instead of a redirect.
const API_PREFIX: &str = "/api";

const MISSING_CREDENTIAL_MESSAGE: &str = "Unauthorized";
const INVALID_CREDENTIAL_MESSAGE: &str = "Invalid token";

/// How the gate treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    ProtectedApi,
    ProtectedPage,
}

/// Static partition of the path space.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    public_prefixes: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PREFIXES)
    }
}

impl RoutePolicy {
    pub fn new<I, S>(public_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_prefixes: public_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a public prefix unless an existing one already covers it.
    #[must_use]
    pub fn with_public(mut self, prefix: &str) -> Self {
        if !self.is_public(prefix) {
            self.public_prefixes.push(prefix.to_string());
        }
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes
            .iter()
            .any(|prefix| segment_prefix_match(path, prefix))
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_public(path) {
            RouteClass::Public
        } else if segment_prefix_match(path, API_PREFIX) {
            RouteClass::ProtectedApi
        } else {
            RouteClass::ProtectedPage
        }
    }
}

/// `path` equals `prefix` or continues it with a `/`.
fn segment_prefix_match(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Where the credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    BearerHeader,
}

impl CredentialSource {
    fn as_str(self) -> &'static str {
        match self {
            CredentialSource::Cookie => "cookie",
            CredentialSource::BearerHeader => "bearer",
        }
    }
}

/// Find the named cookie in the `Cookie` header(s). Empty values count as absent.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(cookie_name, _)| cookie_name.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Token from `Authorization: Bearer <token>`; scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Credential for this request: cookie first, then bearer header.
pub fn extract_credential<'a>(
    headers: &'a HeaderMap,
    cookie_name: &str,
) -> Option<(&'a str, CredentialSource)> {
    cookie_value(headers, cookie_name)
        .map(|token| (token, CredentialSource::Cookie))
        .or_else(|| bearer_token(headers).map(|token| (token, CredentialSource::BearerHeader)))
}

/// Outcome of evaluating one request.
#[derive(Debug)]
pub enum GateDecision {
    /// Public path, no credential consulted.
    Public,
    /// Verified credential.
    Allow(Claims),
    Deny(CredentialError),
}

/// Shared state of the gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub validator: Arc<JwtValidator>,
    pub policy: RoutePolicy,
    pub cookie_name: String,
    pub login_path: String,
}

impl GateState {
    /// Build gate state. The login path is always public so that page
    /// denials cannot redirect into a loop.
    pub fn new(
        validator: Arc<JwtValidator>,
        policy: RoutePolicy,
        cookie_name: String,
        login_path: String,
    ) -> Self {
        Self {
            validator,
            policy: policy.with_public(&login_path),
            cookie_name,
            login_path,
        }
    }

    /// Decide one request.
    pub async fn evaluate(&self, class: RouteClass, headers: &HeaderMap) -> GateDecision {
        if class == RouteClass::Public {
            return GateDecision::Public;
        }

        let Some((token, source)) = extract_credential(headers, &self.cookie_name) else {
            return GateDecision::Deny(CredentialError::Missing);
        };

        match self.validator.validate(token).await {
            Ok(claims) => {
                tracing::debug!(target: "dashboard.gate", source = source.as_str(), "Credential verified");
                GateDecision::Allow(claims)
            }
            Err(error) => {
                tracing::debug!(
                    target: "dashboard.gate",
                    source = source.as_str(),
                    reason = error.reason(),
                    "Credential rejected"
                );
                GateDecision::Deny(error)
            }
        }
    }
}

/// Response for a denied request.
pub fn deny_response(class: RouteClass, error: CredentialError, login_path: &str) -> Response {
    match class {
        RouteClass::ProtectedPage => Redirect::to(login_path).into_response(),
        RouteClass::ProtectedApi | RouteClass::Public => {
            let message = match error {
                CredentialError::Missing => MISSING_CREDENTIAL_MESSAGE,
                _ => INVALID_CREDENTIAL_MESSAGE,
            };
            DashboardError::Unauthorized(message.to_string()).into_response()
        }
    }
}

/// Authorization gate middleware.
///
/// Applied to the whole router so that unmatched paths are gated too.
#[instrument(skip_all, name = "dashboard.middleware.gate")]
pub async fn authorize_request(
    State(state): State<Arc<GateState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let class = state.policy.classify(req.uri().path());

    match state.evaluate(class, req.headers()).await {
        GateDecision::Public => {
            record_gate_decision("allow_public", "public");
            next.run(req).await
        }
        GateDecision::Allow(claims) => {
            record_gate_decision("allow", "verified");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        GateDecision::Deny(error) => {
            let decision = if class == RouteClass::ProtectedPage {
                "deny_page"
            } else {
                "deny_api"
            };
            record_gate_decision(decision, error.reason());
            tracing::debug!(
                target: "dashboard.gate",
                path = %req.uri().path(),
                decision,
                reason = error.reason(),
                "Request denied"
            );
            deny_response(class, error, &state.login_path)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::JwksClient;
    use axum::http::{HeaderValue, StatusCode};
    use http_body_util::BodyExt;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn offline_state() -> GateState {
        // Port 1 refuses connections; any fetch attempt fails fast
        let jwks = Arc::new(JwksClient::new(
            "http://127.0.0.1:1/.well-known/jwks.json".to_string(),
        ));
        let validator = Arc::new(JwtValidator::new(jwks, "https://issuer.example".to_string(), 300));
        GateState::new(
            validator,
            RoutePolicy::default(),
            "idToken".to_string(),
            "/login".to_string(),
        )
    }

    #[test]
    fn test_classify_public_prefixes() {
        let policy = RoutePolicy::default();

        for path in [
            "/login",
            "/signup",
            "/confirm",
            "/api/auth/login",
            "/api/auth",
            "/static/app.css",
            "/favicon.ico",
            "/health",
            "/ready",
            "/metrics",
        ] {
            assert_eq!(policy.classify(path), RouteClass::Public, "{path}");
        }
    }

    #[test]
    fn test_classify_is_segment_aware() {
        let policy = RoutePolicy::default();

        assert_eq!(policy.classify("/loginx"), RouteClass::ProtectedPage);
        assert_eq!(policy.classify("/healthz"), RouteClass::ProtectedPage);
        assert_eq!(policy.classify("/api/authz"), RouteClass::ProtectedApi);
        assert_eq!(policy.classify("/apiary"), RouteClass::ProtectedPage);
    }

    #[test]
    fn test_classify_protected_surfaces() {
        let policy = RoutePolicy::default();

        assert_eq!(policy.classify("/api/items"), RouteClass::ProtectedApi);
        assert_eq!(policy.classify("/api/items/abc"), RouteClass::ProtectedApi);
        assert_eq!(policy.classify("/api/me"), RouteClass::ProtectedApi);
        assert_eq!(policy.classify("/api"), RouteClass::ProtectedApi);
        assert_eq!(policy.classify("/dashboard"), RouteClass::ProtectedPage);
        assert_eq!(policy.classify("/"), RouteClass::ProtectedPage);
    }

    #[test]
    fn test_custom_login_path_is_made_public() {
        let state = {
            let base = offline_state();
            GateState::new(
                base.validator,
                RoutePolicy::default(),
                "idToken".to_string(),
                "/auth/sign-in".to_string(),
            )
        };
        assert_eq!(state.policy.classify("/auth/sign-in"), RouteClass::Public);
    }

    #[test]
    fn test_cookie_value_parsing() {
        let map = headers(&[(header::COOKIE, "theme=dark; idToken=abc.def.ghi; other=1")]);
        assert_eq!(cookie_value(&map, "idToken"), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&map, "missing"), None);

        let empty = headers(&[(header::COOKIE, "idToken=; theme=dark")]);
        assert_eq!(cookie_value(&empty, "idToken"), None);

        let split = headers(&[(header::COOKIE, "a=1"), (header::COOKIE, "idToken=tok")]);
        assert_eq!(cookie_value(&split, "idToken"), Some("tok"));

        let prefixed = headers(&[(header::COOKIE, "xidToken=nope")]);
        assert_eq!(cookie_value(&prefixed, "idToken"), None);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&map), Some("abc.def.ghi"));

        let lower = headers(&[(header::AUTHORIZATION, "bearer   abc.def.ghi  ")]);
        assert_eq!(bearer_token(&lower), Some("abc.def.ghi"));

        let basic = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(bearer_token(&basic), None);

        let empty = headers(&[(header::AUTHORIZATION, "Bearer ")]);
        assert_eq!(bearer_token(&empty), None);

        let bare = headers(&[(header::AUTHORIZATION, "Bearer")]);
        assert_eq!(bearer_token(&bare), None);
    }

    #[test]
    fn test_cookie_takes_precedence_over_header() {
        let map = headers(&[
            (header::COOKIE, "idToken=from-cookie"),
            (header::AUTHORIZATION, "Bearer from-header"),
        ]);
        assert_eq!(
            extract_credential(&map, "idToken"),
            Some(("from-cookie", CredentialSource::Cookie))
        );

        let header_only = headers(&[(header::AUTHORIZATION, "Bearer from-header")]);
        assert_eq!(
            extract_credential(&header_only, "idToken"),
            Some(("from-header", CredentialSource::BearerHeader))
        );
    }

    #[tokio::test]
    async fn test_evaluate_public_and_missing_without_fetch() {
        let state = offline_state();

        assert!(matches!(
            state.evaluate(RouteClass::Public, &HeaderMap::new()).await,
            GateDecision::Public
        ));
        assert!(matches!(
            state.evaluate(RouteClass::ProtectedApi, &HeaderMap::new()).await,
            GateDecision::Deny(CredentialError::Missing)
        ));
        assert_eq!(state.validator.jwks_client().cached_key_count().await, None);
    }

    #[tokio::test]
    async fn test_evaluate_garbage_token_is_malformed() {
        let state = offline_state();
        let map = headers(&[(header::AUTHORIZATION, "Bearer not-a-jwt")]);

        assert!(matches!(
            state.evaluate(RouteClass::ProtectedPage, &map).await,
            GateDecision::Deny(CredentialError::Malformed)
        ));
    }

    #[tokio::test]
    async fn test_deny_response_api_missing() {
        let response = deny_response(RouteClass::ProtectedApi, CredentialError::Missing, "/login");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_some());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_deny_response_api_invalid() {
        let response = deny_response(RouteClass::ProtectedApi, CredentialError::Expired, "/login");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Invalid token"}));
    }

    #[test]
    fn test_deny_response_page_redirects() {
        let response = deny_response(RouteClass::ProtectedPage, CredentialError::Expired, "/login");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login"
        );
    }
}
