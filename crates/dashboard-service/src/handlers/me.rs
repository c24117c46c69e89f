//! `GET /api/me` - identity of the verified caller.

use crate::auth::Claims;
use crate::models::MeResponse;
use axum::{Extension, Json};

/// Return the claims the gate attached to this request.
///
/// The gate guarantees `Claims` are present on every protected route; the
/// extractor rejects with 500 if this handler is ever mounted without it.
#[tracing::instrument(skip_all, name = "dashboard.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    Json(MeResponse {
        sub: claims.sub,
        email: claims.email,
        username: claims.username,
        token_use: claims.token_use,
        exp: claims.exp,
        iat: claims.iat,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_me_copies_claims() {
        let claims = Claims {
            sub: "user-123".to_string(),
            iss: "https://issuer.example".to_string(),
            exp: 1_900_000_000,
            iat: Some(1_899_996_400),
            email: Some("alice@example.com".to_string()),
            username: Some("alice".to_string()),
            token_use: Some("id".to_string()),
        };

        let Json(me) = get_me(Extension(claims)).await;
        let json = serde_json::to_value(&me).unwrap();

        assert_eq!(json["sub"], "user-123");
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["tokenUse"], "id");
        assert_eq!(json["exp"], 1_900_000_000_i64);
        assert!(json.get("iss").is_none());
    }
}
