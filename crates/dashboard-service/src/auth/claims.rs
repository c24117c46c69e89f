//! Identity token claims.
//!
//! Identifying fields (`sub`, `email`, `cognito:username`) are redacted in
//! Debug output so claims can be attached to log spans.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims of a verified identity token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user pool user id) - redacted in Debug output.
    pub sub: String,

    /// Issuer. Always equal to the configured issuer once verified.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds). Optional in the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(
        default,
        rename = "cognito:username",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// `id` for identity tokens, `access` for access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username.as_ref().map(|_| "[REDACTED]"))
            .field("token_use", &self.token_use)
            .finish()
    }
}

impl Claims {
    /// Name shown for the signed-in user: email, then username, then subject.
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.sub)
    }
}
