//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] types. `SecretString` implements `Debug` with
//! redaction, so any struct deriving `Debug` that holds one is safe to log.
//! Values are zeroized on drop.
//!
//! Use `SecretString` for:
//! - The user pool app client secret
//! - User passwords passing through the sign-up and login endpoints
//! - Issued tokens (id, access, refresh) held by the identity client
//! - Connection URLs that may embed credentials (Redis)
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     email: "alice@example.com".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter2"));
//! assert_eq!(req.password.expose_secret(), "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_login_body() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Credentials {
            email: String,
            password: SecretString,
        }

        let json = r#"{"email": "bob@example.com", "password": "my-secret-value"}"#;
        let creds: Credentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.password.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("bob@example.com"));
        assert!(!debug.contains("my-secret-value"));
    }
}
