//! Dashboard service configuration.
//!
//! Configuration is loaded from environment variables. The user pool
//! coordinates (region + pool id) determine the token issuer and the JWKS
//! document location unless those are overridden explicitly. Secrets are
//! redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default user pool region.
pub const DEFAULT_COGNITO_REGION: &str = "us-east-1";

/// Default minimum interval between miss-triggered JWKS refreshes.
pub const DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS: u64 = 30;

/// Default maximum age of a cached key set before a forced refresh.
pub const DEFAULT_JWKS_MAX_AGE_SECONDS: u64 = 600;

/// Default cookie carrying the identity token.
pub const DEFAULT_ID_TOKEN_COOKIE: &str = "idToken";

/// Default login entry point for page redirects.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Which item store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStoreKind {
    /// Process-local store, used for development and tests.
    Memory,

    /// Redis-compatible key-value store.
    Redis,
}

/// Dashboard service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// User pool region (e.g., "us-east-1").
    pub cognito_region: String,

    /// User pool identifier (e.g., "us-east-1_AbCdEf123").
    pub user_pool_id: String,

    /// App client id used for sign-up, confirmation and login.
    pub client_id: String,

    /// App client secret. When set, every identity call carries a secret hash.
    pub client_secret: Option<SecretString>,

    /// Base URL of the identity provider API.
    pub identity_endpoint: String,

    /// Exact `iss` value accepted on credentials.
    pub token_issuer: String,

    /// URL of the issuer's JWKS document.
    pub jwks_url: String,

    /// Clock skew tolerance in seconds for `iat` validation.
    pub jwt_clock_skew_seconds: i64,

    /// Minimum interval between refreshes triggered by an unknown `kid`.
    pub jwks_refresh_cooldown: Duration,

    /// Maximum age of the cached key set.
    pub jwks_max_age: Duration,

    /// Name of the cookie checked for the identity token.
    pub id_token_cookie: String,

    /// Page that unauthenticated browser requests are redirected to.
    pub login_path: String,

    /// Item store backend.
    pub item_store: ItemStoreKind,

    /// Redis connection URL (required when `item_store` is `Redis`).
    pub redis_url: Option<SecretString>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("cognito_region", &self.cognito_region)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("identity_endpoint", &self.identity_endpoint)
            .field("token_issuer", &self.token_issuer)
            .field("jwks_url", &self.jwks_url)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_refresh_cooldown", &self.jwks_refresh_cooldown)
            .field("jwks_max_age", &self.jwks_max_age)
            .field("id_token_cookie", &self.id_token_cookie)
            .field("login_path", &self.login_path)
            .field("item_store", &self.item_store)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid item store configuration: {0}")]
    InvalidItemStore(String),

    #[error("Invalid path configuration: {0}")]
    InvalidPath(String),
}

/// Issuer URL of a user pool.
pub fn user_pool_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// JWKS document URL of a user pool.
pub fn user_pool_jwks_url(region: &str, user_pool_id: &str) -> String {
    format!(
        "{}/.well-known/jwks.json",
        user_pool_issuer(region, user_pool_id)
    )
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let cognito_region = vars
            .get("COGNITO_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_COGNITO_REGION.to_string());

        let user_pool_id = required(vars, "COGNITO_USER_POOL_ID")?;
        let client_id = required(vars, "COGNITO_CLIENT_ID")?;

        let client_secret = vars
            .get("COGNITO_CLIENT_SECRET")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.as_str()));

        let identity_endpoint = vars
            .get("COGNITO_ENDPOINT")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://cognito-idp.{cognito_region}.amazonaws.com"));

        let token_issuer = vars
            .get("TOKEN_ISSUER")
            .cloned()
            .unwrap_or_else(|| user_pool_issuer(&cognito_region, &user_pool_id));

        let jwks_url = vars
            .get("JWKS_URL")
            .cloned()
            .unwrap_or_else(|| user_pool_jwks_url(&cognito_region, &user_pool_id));

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let jwks_refresh_cooldown = Duration::from_secs(parse_seconds(
            vars,
            "JWKS_REFRESH_COOLDOWN_SECONDS",
            DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS,
            true,
        )?);

        let jwks_max_age = Duration::from_secs(parse_seconds(
            vars,
            "JWKS_MAX_AGE_SECONDS",
            DEFAULT_JWKS_MAX_AGE_SECONDS,
            false,
        )?);

        let id_token_cookie = vars
            .get("ID_TOKEN_COOKIE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ID_TOKEN_COOKIE.to_string());

        let login_path = vars
            .get("LOGIN_PATH")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::InvalidPath(format!(
                "LOGIN_PATH must start with '/', got '{}'",
                login_path
            )));
        }

        let item_store = match vars.get("ITEM_STORE").map(String::as_str) {
            None | Some("memory") => ItemStoreKind::Memory,
            Some("redis") => ItemStoreKind::Redis,
            Some(other) => {
                return Err(ConfigError::InvalidItemStore(format!(
                    "ITEM_STORE must be 'memory' or 'redis', got '{}'",
                    other
                )))
            }
        };

        let redis_url = vars
            .get("REDIS_URL")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.as_str()));

        if item_store == ItemStoreKind::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingEnvVar("REDIS_URL".to_string()));
        }

        Ok(Config {
            bind_address,
            cognito_region,
            user_pool_id,
            client_id,
            client_secret,
            identity_endpoint,
            token_issuer,
            jwks_url,
            jwt_clock_skew_seconds,
            jwks_refresh_cooldown,
            jwks_max_age,
            id_token_cookie,
            login_path,
            item_store,
            redis_url,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|s| !s.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwksCache(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidJwksCache(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
