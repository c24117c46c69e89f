//! Credential issuance endpoints.
//!
//! Thin proxies in front of the identity provider:
//!
//! - `POST /api/auth/signup` - register an email/password account
//! - `POST /api/auth/confirm` - confirm the account with the emailed code
//! - `POST /api/auth/login` - password login, sets the identity token cookie
//! - `POST /api/auth/logout` - clears the identity token cookie
//!
//! These routes are public. Provider error kinds are translated to client
//! messages here; the provider's own message is logged, never returned.
//!
//! # Security
//!
//! - Passwords are held in `SecretString` and never logged
//! - The token cookie is `HttpOnly` and `SameSite=Strict`

use crate::errors::DashboardError;
use crate::models::{
    ConfirmRequest, CredentialsRequest, LoginResponse, SignupResponse, SuccessResponse,
};
use crate::routes::AppState;
use crate::services::{IdentityError, IdentityErrorKind};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// Lifetime of the identity token cookie, matching the token lifetime.
pub const ID_TOKEN_COOKIE_MAX_AGE_SECONDS: u64 = 3600;

/// Challenge returned for accounts created with a temporary password.
const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

/// `Set-Cookie` value carrying the identity token.
pub fn session_cookie(name: &str, token: &str) -> String {
    format!(
        "{name}={token}; Path=/; Max-Age={ID_TOKEN_COOKIE_MAX_AGE_SECONDS}; SameSite=Strict; HttpOnly"
    )
}

/// `Set-Cookie` value that removes the identity token cookie.
pub fn clearing_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; SameSite=Strict; HttpOnly")
}

/// Email and password from a credentials body, trimmed email, both non-empty.
fn required_credentials(
    request: CredentialsRequest,
) -> Result<(String, SecretString), DashboardError> {
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    let password = request
        .password
        .filter(|p| !p.expose_secret().is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(DashboardError::BadRequest(
            "Email and password are required".to_string(),
        )),
    }
}

fn unavailable(error: &IdentityError) -> Option<DashboardError> {
    match error {
        IdentityError::Unavailable(detail) => Some(DashboardError::ServiceUnavailable(detail.clone())),
        _ => None,
    }
}

/// Map a sign-up failure to a client error.
pub fn signup_error(error: IdentityError) -> DashboardError {
    if let Some(e) = unavailable(&error) {
        return e;
    }

    let message = match error {
        IdentityError::Rejected { kind } => match kind {
            IdentityErrorKind::UsernameExists => "An account with this email already exists.",
            IdentityErrorKind::InvalidPassword => {
                "Password does not meet the security requirements (length, numbers, symbols)."
            }
            IdentityErrorKind::InvalidParameter => "Invalid parameter. Check the email address.",
            IdentityErrorKind::TooManyRequests => "Too many requests. Try again later.",
            _ => "Could not register user",
        },
        _ => "Could not register user",
    };
    DashboardError::BadRequest(message.to_string())
}

/// Map a confirmation failure to a client error.
pub fn confirm_error(error: IdentityError) -> DashboardError {
    if let Some(e) = unavailable(&error) {
        return e;
    }

    let message = match error {
        IdentityError::Rejected { kind } => match kind {
            IdentityErrorKind::CodeMismatch => "The verification code is incorrect.",
            IdentityErrorKind::ExpiredCode => "The verification code has expired.",
            IdentityErrorKind::UserNotFound => "No user exists with that email.",
            IdentityErrorKind::NotAuthorized => "The user has already been confirmed.",
            IdentityErrorKind::TooManyRequests => "Too many requests. Try again later.",
            _ => "Could not confirm email",
        },
        _ => "Could not confirm email",
    };
    DashboardError::BadRequest(message.to_string())
}

/// Map a login failure to a client error.
pub fn login_error(error: IdentityError) -> DashboardError {
    if let Some(e) = unavailable(&error) {
        return e;
    }

    let message = match error {
        IdentityError::ChallengeRequired(challenge) if challenge == NEW_PASSWORD_REQUIRED => {
            "You must change your temporary password before signing in.".to_string()
        }
        IdentityError::ChallengeRequired(challenge) => {
            format!("Pending security challenge: {challenge}")
        }
        IdentityError::MissingToken => "Authentication failed (no token)".to_string(),
        IdentityError::Rejected { kind } => match kind {
            IdentityErrorKind::NotAuthorized => "Incorrect email or password.",
            IdentityErrorKind::UserNotFound => "No user exists with that email.",
            IdentityErrorKind::UserNotConfirmed => "You must confirm your email account first.",
            IdentityErrorKind::PasswordResetRequired => "You must reset your password.",
            IdentityErrorKind::TooManyRequests => "Too many requests. Try again later.",
            _ => "Authentication failed",
        }
        .to_string(),
        IdentityError::Unavailable(_) => "Authentication failed".to_string(),
    };
    DashboardError::Unauthorized(message)
}

/// Handler for `POST /api/auth/signup`.
#[instrument(skip_all, name = "dashboard.handlers.signup")]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SignupResponse>, DashboardError> {
    let (email, password) = required_credentials(request)?;

    let outcome = state
        .identity
        .sign_up(&email, &password)
        .await
        .map_err(signup_error)?;

    tracing::info!(
        target: "dashboard.identity",
        user_confirmed = outcome.user_confirmed,
        "Account registered"
    );

    Ok(Json(SignupResponse {
        success: true,
        user_confirmed: outcome.user_confirmed,
        user_sub: outcome.user_sub,
        email,
    }))
}

/// Handler for `POST /api/auth/confirm`.
#[instrument(skip_all, name = "dashboard.handlers.confirm")]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<SuccessResponse>, DashboardError> {
    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    let code = request
        .code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let (Some(email), Some(code)) = (email, code) else {
        return Err(DashboardError::BadRequest(
            "Email and code are required".to_string(),
        ));
    };

    state
        .identity
        .confirm_sign_up(&email, &code)
        .await
        .map_err(confirm_error)?;

    tracing::info!(target: "dashboard.identity", "Account confirmed");
    Ok(Json(SuccessResponse::ok()))
}

/// Handler for `POST /api/auth/login`.
///
/// Returns the tokens in the body and sets the identity token cookie that
/// the authorization gate reads on later requests.
#[instrument(skip_all, name = "dashboard.handlers.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Response, DashboardError> {
    let (email, password) = required_credentials(request)?;

    let tokens = state
        .identity
        .initiate_auth(&email, &password)
        .await
        .map_err(login_error)?;

    let id_token = tokens.id_token.expose_secret().to_string();
    let cookie = session_cookie(&state.config.id_token_cookie, &id_token);

    tracing::info!(target: "dashboard.identity", "Login succeeded");

    let body = LoginResponse {
        id_token,
        access_token: tokens.access_token.expose_secret().to_string(),
        refresh_token: tokens.refresh_token.expose_secret().to_string(),
        email,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Handler for `POST /api/auth/logout`.
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::SET_COOKIE, clearing_cookie(&state.config.id_token_cookie))],
        Json(SuccessResponse::ok()),
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn rejected(kind: IdentityErrorKind) -> IdentityError {
        IdentityError::Rejected { kind }
    }

    fn message(error: DashboardError) -> (u16, String) {
        let status = error.status_code();
        let text = match error {
            DashboardError::BadRequest(m)
            | DashboardError::Unauthorized(m)
            | DashboardError::ServiceUnavailable(m)
            | DashboardError::NotFound(m)
            | DashboardError::Store(m) => m,
            DashboardError::Internal => String::new(),
        };
        (status, text)
    }

    #[test]
    fn test_session_cookie_attributes() {
        assert_eq!(
            session_cookie("idToken", "a.b.c"),
            "idToken=a.b.c; Path=/; Max-Age=3600; SameSite=Strict; HttpOnly"
        );
        assert_eq!(
            clearing_cookie("idToken"),
            "idToken=; Path=/; Max-Age=0; SameSite=Strict; HttpOnly"
        );
    }

    #[test]
    fn test_required_credentials() {
        let ok = required_credentials(CredentialsRequest {
            email: Some(" alice@example.com ".to_string()),
            password: Some(SecretString::from("hunter2")),
        })
        .unwrap();
        assert_eq!(ok.0, "alice@example.com");

        for (email, password) in [
            (None, Some("pw")),
            (Some("alice@example.com"), None),
            (Some("  "), Some("pw")),
            (Some("alice@example.com"), Some("")),
        ] {
            let result = required_credentials(CredentialsRequest {
                email: email.map(ToString::to_string),
                password: password.map(SecretString::from),
            });
            assert!(matches!(result, Err(DashboardError::BadRequest(_))));
        }
    }

    #[test]
    fn test_signup_error_messages() {
        let (status, msg) = message(signup_error(rejected(IdentityErrorKind::UsernameExists)));
        assert_eq!(status, 400);
        assert!(msg.contains("already exists"));

        let (status, _) = message(signup_error(rejected(IdentityErrorKind::InvalidPassword)));
        assert_eq!(status, 400);

        let (_, msg) = message(signup_error(rejected(IdentityErrorKind::Other)));
        assert_eq!(msg, "Could not register user");
    }

    #[test]
    fn test_confirm_error_messages() {
        let (status, msg) = message(confirm_error(rejected(IdentityErrorKind::CodeMismatch)));
        assert_eq!(status, 400);
        assert!(msg.contains("incorrect"));

        let (_, msg) = message(confirm_error(rejected(IdentityErrorKind::NotAuthorized)));
        assert!(msg.contains("already been confirmed"));

        let (_, msg) = message(confirm_error(rejected(IdentityErrorKind::ExpiredCode)));
        assert!(msg.contains("expired"));
    }

    #[test]
    fn test_login_error_messages() {
        let (status, msg) = message(login_error(rejected(IdentityErrorKind::NotAuthorized)));
        assert_eq!(status, 401);
        assert_eq!(msg, "Incorrect email or password.");

        let (status, msg) = message(login_error(IdentityError::ChallengeRequired(
            "NEW_PASSWORD_REQUIRED".to_string(),
        )));
        assert_eq!(status, 401);
        assert!(msg.contains("temporary password"));

        let (_, msg) = message(login_error(IdentityError::ChallengeRequired(
            "SMS_MFA".to_string(),
        )));
        assert_eq!(msg, "Pending security challenge: SMS_MFA");

        let (status, _) = message(login_error(IdentityError::MissingToken));
        assert_eq!(status, 401);
    }

    #[test]
    fn test_unavailable_maps_to_503_everywhere() {
        for error in [
            signup_error(IdentityError::Unavailable("down".to_string())),
            confirm_error(IdentityError::Unavailable("down".to_string())),
            login_error(IdentityError::Unavailable("down".to_string())),
        ] {
            assert_eq!(error.status_code(), 503);
        }
    }
}
