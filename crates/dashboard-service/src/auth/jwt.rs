//! Identity token verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (via `common::jwt::parse_header`)
//! - The key is selected by `kid` from the issuer's key set; the header `alg`
//!   must match the algorithm of that key
//! - `exp` is enforced with zero leeway, `iss` must equal the configured issuer
//! - `nbf`, when present, must not be in the future
//! - `iat`, when present, may be at most the configured clock skew ahead
//! - Every failure is reported as an opaque `CredentialError`; the reason is
//!   logged at debug level only

use crate::auth::claims::Claims;
use crate::auth::jwks::{JwksClient, VerificationKey};
use crate::errors::CredentialError;
use common::jwt::{parse_header, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Claims every accepted token must carry.
const REQUIRED_CLAIMS: [&str; 3] = ["exp", "iss", "sub"];

/// Verifies identity tokens against the issuer's key set.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,

    /// Expected `iss` claim.
    issuer: String,

    /// Tolerance for `iat` in the future.
    clock_skew_seconds: i64,
}

impl JwtValidator {
    pub fn new(jwks_client: Arc<JwksClient>, issuer: String, clock_skew_seconds: i64) -> Self {
        Self {
            jwks_client,
            issuer,
            clock_skew_seconds,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }

    /// Validate a token and return its claims.
    ///
    /// 1. Size and structure check, `kid`/`alg` from the unverified header
    /// 2. Resolve the verification key (may refresh the key set)
    /// 3. Verify signature, `exp` and `iss`
    /// 4. Validate `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Returns the `CredentialError` describing the first failed check.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Claims, CredentialError> {
        let header = parse_header(token).map_err(|e| {
            tracing::debug!(target: "dashboard.auth.jwt", error = ?e, "Token header rejected");
            CredentialError::Malformed
        })?;

        let key = self.jwks_client.get_key(&header.kid).await?;

        if header.alg.parse::<Algorithm>().ok() != Some(key.algorithm) {
            tracing::debug!(
                target: "dashboard.auth.jwt",
                kid = %header.kid,
                header_alg = %header.alg,
                "Token algorithm does not match key"
            );
            return Err(CredentialError::SignatureMismatch);
        }

        let claims = verify_token(token, &key, &self.issuer)?;

        if let Some(iat) = claims.iat {
            let skew = Duration::from_secs(u64::try_from(self.clock_skew_seconds).unwrap_or(0));
            if let Err(e) = validate_iat(iat, skew) {
                tracing::debug!(target: "dashboard.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(CredentialError::IssuedInFuture);
            }
        }

        tracing::debug!(target: "dashboard.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}

/// Verify signature and registered claims with an already-resolved key.
fn verify_token(token: &str, key: &VerificationKey, issuer: &str) -> Result<Claims, CredentialError> {
    let mut validation = Validation::new(key.algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Identity tokens carry the app client id as `aud`; the gate does not pin it
    validation.validate_aud = false;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);

    let token_data = decode::<Claims>(token, &key.decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "dashboard.auth.jwt", error = %e, "Token verification failed");
        map_verification_error(e.kind())
    })?;

    Ok(token_data.claims)
}

fn map_verification_error(kind: &ErrorKind) -> CredentialError {
    match kind {
        ErrorKind::ExpiredSignature => CredentialError::Expired,
        ErrorKind::ImmatureSignature => CredentialError::IssuedInFuture,
        ErrorKind::InvalidIssuer => CredentialError::IssuerMismatch,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            CredentialError::SignatureMismatch
        }
        _ => CredentialError::Malformed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use common::jwt::MAX_JWT_SIZE_BYTES;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ISSUER: &str = "https://issuer.example/pool";

    async fn validator_with_keys(server: &MockServer, keys: serde_json::Value) -> JwtValidator {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(server)
            .await;
        let jwks = Arc::new(JwksClient::new(format!(
            "{}/.well-known/jwks.json",
            server.uri()
        )));
        JwtValidator::new(jwks, ISSUER.to_string(), 300)
    }

    fn unsigned_token(header: serde_json::Value, payload: serde_json::Value) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string()),
            URL_SAFE_NO_PAD.encode([0u8; 64])
        )
    }

    #[test]
    fn test_map_verification_error() {
        assert_eq!(
            map_verification_error(&ErrorKind::ExpiredSignature),
            CredentialError::Expired
        );
        assert_eq!(
            map_verification_error(&ErrorKind::ImmatureSignature),
            CredentialError::IssuedInFuture
        );
        assert_eq!(
            map_verification_error(&ErrorKind::InvalidIssuer),
            CredentialError::IssuerMismatch
        );
        assert_eq!(
            map_verification_error(&ErrorKind::InvalidSignature),
            CredentialError::SignatureMismatch
        );
        assert_eq!(
            map_verification_error(&ErrorKind::MissingRequiredClaim("sub".to_string())),
            CredentialError::Malformed
        );
        assert_eq!(
            map_verification_error(&ErrorKind::InvalidToken),
            CredentialError::Malformed
        );
    }

    #[tokio::test]
    async fn test_structurally_invalid_tokens_are_malformed_without_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .expect(0)
            .mount(&server)
            .await;
        let jwks = Arc::new(JwksClient::new(format!("{}/.well-known/jwks.json", server.uri())));
        let validator = JwtValidator::new(jwks, ISSUER.to_string(), 300);

        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.payload.sig"] {
            assert_eq!(
                validator.validate(token).await.unwrap_err(),
                CredentialError::Malformed,
                "token {token:?}"
            );
        }

        let no_kid = unsigned_token(json!({"alg": "EdDSA"}), json!({"sub": "a"}));
        assert_eq!(
            validator.validate(&no_kid).await.unwrap_err(),
            CredentialError::Malformed
        );

        let oversized = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"k"}"#),
            "a".repeat(MAX_JWT_SIZE_BYTES)
        );
        assert_eq!(
            validator.validate(&oversized).await.unwrap_err(),
            CredentialError::Malformed
        );
    }

    #[tokio::test]
    async fn test_unknown_kid_is_unknown_key() {
        let server = MockServer::start().await;
        let validator = validator_with_keys(&server, json!([])).await;

        let token = unsigned_token(
            json!({"alg": "EdDSA", "kid": "nobody"}),
            json!({"sub": "a", "iss": ISSUER, "exp": 4_000_000_000_i64}),
        );
        assert_eq!(
            validator.validate(&token).await.unwrap_err(),
            CredentialError::UnknownKey
        );
    }

    #[tokio::test]
    async fn test_header_alg_must_match_key() {
        let server = MockServer::start().await;
        let validator = validator_with_keys(
            &server,
            json!([{
                "kty": "OKP",
                "kid": "ed-key",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode([7u8; 32])
            }]),
        )
        .await;

        let token = unsigned_token(
            json!({"alg": "HS256", "kid": "ed-key"}),
            json!({"sub": "a", "iss": ISSUER, "exp": 4_000_000_000_i64}),
        );
        assert_eq!(
            validator.validate(&token).await.unwrap_err(),
            CredentialError::SignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_bad_signature_is_signature_mismatch() {
        let server = MockServer::start().await;
        let validator = validator_with_keys(
            &server,
            json!([{
                "kty": "OKP",
                "kid": "ed-key",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode([7u8; 32])
            }]),
        )
        .await;

        let token = unsigned_token(
            json!({"alg": "EdDSA", "kid": "ed-key"}),
            json!({"sub": "a", "iss": ISSUER, "exp": 4_000_000_000_i64}),
        );
        assert_eq!(
            validator.validate(&token).await.unwrap_err(),
            CredentialError::SignatureMismatch
        );
    }
}
