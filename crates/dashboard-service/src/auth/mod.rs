//! Credential verification for the authorization gate.
//!
//! # Components
//!
//! - `jwks` - key resolver that fetches and caches the issuer's public key set
//! - `jwt` - token verification (signature, issuer, expiry, issued-at)
//! - `claims` - claims carried by a verified identity token

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
pub use crate::errors::CredentialError;
