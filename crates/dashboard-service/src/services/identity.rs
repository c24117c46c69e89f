//! Identity provider client.
//!
//! Talks to a Cognito-style user pool over its JSON 1.1 protocol: a single
//! POST endpoint, the operation named by the `X-Amz-Target` header. Only the
//! unauthenticated user operations are used (`SignUp`, `ConfirmSignUp`,
//! `InitiateAuth` with `USER_PASSWORD_AUTH`), so requests are not signed.
//!
//! When the app client has a secret, each call carries
//! `SecretHash = base64(HMAC-SHA256(secret, username || client_id))`.
//!
//! # Security
//!
//! - Passwords and issued tokens are held as `SecretString`
//! - Error bodies from the provider are parsed into [`IdentityErrorKind`];
//!   provider messages are logged, never returned verbatim
//! - Timeouts prevent hanging connections

use crate::observability::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use ring::hmac;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{instrument, warn};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Error kinds reported by the identity provider.
///
/// Parsed from the `__type` member of an error body, e.g.
/// `com.amazonaws.cognito#UserNotFoundException` or `NotAuthorizedException`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityErrorKind {
    UsernameExists,
    InvalidPassword,
    InvalidParameter,
    CodeMismatch,
    ExpiredCode,
    UserNotFound,
    /// Wrong credentials, or (on confirm) the user is already confirmed.
    NotAuthorized,
    UserNotConfirmed,
    PasswordResetRequired,
    TooManyRequests,
    Other,
}

impl IdentityErrorKind {
    /// Parse the provider's error type name.
    pub fn from_error_type(error_type: &str) -> Self {
        // `__type` may be namespaced with '#'; the header form may carry a ':' suffix
        let name = error_type.rsplit('#').next().unwrap_or(error_type);
        let name = name.split(':').next().unwrap_or(name).trim();

        match name {
            "UsernameExistsException" => IdentityErrorKind::UsernameExists,
            "InvalidPasswordException" => IdentityErrorKind::InvalidPassword,
            "InvalidParameterException" => IdentityErrorKind::InvalidParameter,
            "CodeMismatchException" => IdentityErrorKind::CodeMismatch,
            "ExpiredCodeException" => IdentityErrorKind::ExpiredCode,
            "UserNotFoundException" => IdentityErrorKind::UserNotFound,
            "NotAuthorizedException" => IdentityErrorKind::NotAuthorized,
            "UserNotConfirmedException" => IdentityErrorKind::UserNotConfirmed,
            "PasswordResetRequiredException" => IdentityErrorKind::PasswordResetRequired,
            "TooManyRequestsException" | "LimitExceededException" => {
                IdentityErrorKind::TooManyRequests
            }
            _ => IdentityErrorKind::Other,
        }
    }
}

/// Identity provider call failures.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider answered and refused the request.
    #[error("identity provider rejected the request: {kind:?}")]
    Rejected { kind: IdentityErrorKind },

    /// Login needs an additional step (e.g. `NEW_PASSWORD_REQUIRED`).
    #[error("authentication challenge pending: {0}")]
    ChallengeRequired(String),

    /// Login succeeded without an identity token.
    #[error("identity provider returned no identity token")]
    MissingToken,

    /// The provider could not be reached or answered with a server error.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Tokens issued by a successful password login.
#[derive(Debug)]
pub struct AuthTokens {
    pub id_token: SecretString,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user_confirmed: bool,
    pub user_sub: String,
}

/// Trait for identity provider operations (enables mocking).
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn sign_up(&self, email: &str, password: &SecretString)
        -> Result<SignUpOutcome, IdentityError>;

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), IdentityError>;

    async fn initiate_auth(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, IdentityError>;
}

/// Compute the app client secret hash for `username`.
pub fn secret_hash(client_secret: &SecretString, username: &str, client_id: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, client_secret.expose_secret().as_bytes());
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(username.as_bytes());
    ctx.update(client_id.as_bytes());
    STANDARD.encode(ctx.sign().as_ref())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_hash: Option<String>,
    user_attributes: Vec<AttributeType<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    #[serde(default)]
    user_sub: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_hash: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct AuthParameters<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_hash: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    #[serde(default)]
    challenge_name: Option<String>,
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Empty {}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the user pool's JSON 1.1 endpoint.
#[derive(Clone)]
pub struct CognitoIdentityClient {
    client: Client,
    endpoint: String,
    client_id: String,
    client_secret: Option<SecretString>,
}

impl CognitoIdentityClient {
    /// Create a new identity client.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Unavailable` if the HTTP client cannot be built.
    pub fn new(
        endpoint: String,
        client_id: String,
        client_secret: Option<SecretString>,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                tracing::error!(target: "dashboard.identity", error = %e, "Failed to build HTTP client");
                IdentityError::Unavailable(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            client_id,
            client_secret,
        })
    }

    fn hash_for(&self, username: &str) -> Option<String> {
        self.client_secret
            .as_ref()
            .map(|secret| secret_hash(secret, username, &self.client_id))
    }

    /// POST one operation and decode its response.
    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        request: &Req,
    ) -> Result<Resp, IdentityError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let start = Instant::now();
        let result = self.send(operation, request).await;

        let status = match &result {
            Ok(_) => "success",
            Err(IdentityError::Unavailable(_)) => "unavailable",
            Err(_) => "rejected",
        };
        metrics::record_identity_request(operation, status, start.elapsed());

        result
    }

    async fn send<Req, Resp>(&self, operation: &'static str, request: &Req) -> Result<Resp, IdentityError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "dashboard.identity", operation, error = %e, "Identity provider request failed");
                IdentityError::Unavailable(format!("{operation} request failed: {e}"))
            })?;

        let status = response.status();

        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                warn!(target: "dashboard.identity", operation, error = %e, "Failed to parse identity provider response");
                IdentityError::Unavailable(format!("{operation} response invalid: {e}"))
            });
        }

        if status.is_server_error() {
            warn!(target: "dashboard.identity", operation, status = %status, "Identity provider server error");
            return Err(IdentityError::Unavailable(format!(
                "{operation} returned {status}"
            )));
        }

        let header_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body: ErrorBody = response.json().await.unwrap_or(ErrorBody {
            error_type: None,
            message: None,
        });

        let kind = body
            .error_type
            .as_deref()
            .or(header_type.as_deref())
            .map_or(IdentityErrorKind::Other, IdentityErrorKind::from_error_type);

        tracing::info!(
            target: "dashboard.identity",
            operation,
            status = %status,
            kind = ?kind,
            message = body.message.as_deref().unwrap_or(""),
            "Identity provider rejected request"
        );

        Err(IdentityError::Rejected { kind })
    }
}

#[async_trait]
impl IdentityClient for CognitoIdentityClient {
    #[instrument(skip_all, name = "dashboard.identity.sign_up")]
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SignUpOutcome, IdentityError> {
        let request = SignUpRequest {
            client_id: &self.client_id,
            username: email,
            password: password.expose_secret(),
            secret_hash: self.hash_for(email),
            user_attributes: vec![AttributeType {
                name: "email",
                value: email,
            }],
        };

        let response: SignUpResponse = self.call("SignUp", &request).await?;

        Ok(SignUpOutcome {
            user_confirmed: response.user_confirmed,
            user_sub: response.user_sub,
        })
    }

    #[instrument(skip_all, name = "dashboard.identity.confirm_sign_up")]
    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), IdentityError> {
        let request = ConfirmSignUpRequest {
            client_id: &self.client_id,
            username: email,
            confirmation_code: code,
            secret_hash: self.hash_for(email),
        };

        let _: Empty = self.call("ConfirmSignUp", &request).await?;
        Ok(())
    }

    #[instrument(skip_all, name = "dashboard.identity.initiate_auth")]
    async fn initiate_auth(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthTokens, IdentityError> {
        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: AuthParameters {
                username: email,
                password: password.expose_secret(),
                secret_hash: self.hash_for(email),
            },
        };

        let response: InitiateAuthResponse = self.call("InitiateAuth", &request).await?;

        if let Some(challenge) = response.challenge_name {
            return Err(IdentityError::ChallengeRequired(challenge));
        }

        let result = response
            .authentication_result
            .ok_or(IdentityError::MissingToken)?;
        let id_token = result.id_token.ok_or(IdentityError::MissingToken)?;

        Ok(AuthTokens {
            id_token: SecretString::from(id_token),
            access_token: SecretString::from(result.access_token.unwrap_or_default()),
            refresh_token: SecretString::from(result.refresh_token.unwrap_or_default()),
        })
    }
}
