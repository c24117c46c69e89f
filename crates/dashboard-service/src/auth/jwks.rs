//! Key resolver for the identity issuer's JSON Web Key Set.
//!
//! Fetches the issuer's `/.well-known/jwks.json` document, converts each
//! usable entry into a verification key and serves lookups by key id.
//!
//! # Caching
//!
//! - The key set is held as an immutable snapshot and replaced whole on
//!   refresh, so a reader never observes a half-updated set
//! - A lookup for an unknown `kid` triggers a refresh, unless the snapshot is
//!   younger than the refresh cooldown (bounds fetches caused by garbage kids)
//! - A snapshot older than the max age is refreshed before it is used, so keys
//!   removed by the issuer stop verifying
//! - Refreshes are serialized; concurrent misses share one fetch, and a
//!   waiter queued behind a failed fetch gets that failure instead of
//!   starting another one
//! - A failed fetch leaves the previous snapshot in place

use crate::errors::CredentialError;
use crate::observability::metrics;
use common::jwt::decode_jwk_component;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Minimum time between refreshes triggered by an unknown `kid` (seconds).
pub const DEFAULT_REFRESH_COOLDOWN_SECONDS: u64 = 30;

/// Maximum age of a snapshot before it must be refetched (seconds).
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 600;

/// Upper bound on a single key set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Ed25519 public keys are 32 bytes.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// JSON Web Key as published by the issuer.
///
/// Only the members needed for RSA (`n`, `e`) and Ed25519 (`crv`, `x`)
/// signature keys are read; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kty: String,

    #[serde(default)]
    pub kid: String,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    #[serde(default)]
    pub crv: Option<String>,

    /// Ed25519 public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

/// Key set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Why a JWK could not be turned into a verification key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyConversionError {
    #[error("key is not a signature key")]
    NotForSignatures,

    #[error("unsupported key type or algorithm: {0}")]
    Unsupported(String),

    #[error("missing key component: {0}")]
    MissingComponent(&'static str),

    #[error("invalid key component: {0}")]
    InvalidComponent(&'static str),
}

/// A public key ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: String,
    pub algorithm: Algorithm,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Convert a published JWK into a verification key.
    ///
    /// Accepts RSA keys for RS256/RS384/RS512 (RS256 when `alg` is absent)
    /// and OKP Ed25519 keys for EdDSA.
    ///
    /// # Errors
    ///
    /// Returns a `KeyConversionError` describing why the entry is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyConversionError> {
        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(KeyConversionError::NotForSignatures);
            }
        }

        match jwk.kty.as_str() {
            "RSA" => {
                let algorithm = match jwk.alg.as_deref() {
                    None | Some("RS256") => Algorithm::RS256,
                    Some("RS384") => Algorithm::RS384,
                    Some("RS512") => Algorithm::RS512,
                    Some(other) => return Err(KeyConversionError::Unsupported(other.to_string())),
                };
                let n = jwk.n.as_deref().ok_or(KeyConversionError::MissingComponent("n"))?;
                let e = jwk.e.as_deref().ok_or(KeyConversionError::MissingComponent("e"))?;
                let modulus = decode_jwk_component(n)
                    .map_err(|_| KeyConversionError::InvalidComponent("n"))?;
                let exponent = decode_jwk_component(e)
                    .map_err(|_| KeyConversionError::InvalidComponent("e"))?;
                if modulus.is_empty() {
                    return Err(KeyConversionError::InvalidComponent("n"));
                }
                if exponent.is_empty() {
                    return Err(KeyConversionError::InvalidComponent("e"));
                }

                Ok(Self {
                    kid: jwk.kid.clone(),
                    algorithm,
                    decoding_key: DecodingKey::from_rsa_raw_components(&modulus, &exponent),
                })
            }
            "OKP" => {
                if let Some(alg) = jwk.alg.as_deref() {
                    if alg != "EdDSA" {
                        return Err(KeyConversionError::Unsupported(alg.to_string()));
                    }
                }
                if let Some(crv) = jwk.crv.as_deref() {
                    if crv != "Ed25519" {
                        return Err(KeyConversionError::Unsupported(crv.to_string()));
                    }
                }
                let x = jwk.x.as_deref().ok_or(KeyConversionError::MissingComponent("x"))?;
                let public_key = decode_jwk_component(x)
                    .map_err(|_| KeyConversionError::InvalidComponent("x"))?;
                if public_key.len() != ED25519_PUBLIC_KEY_LEN {
                    return Err(KeyConversionError::InvalidComponent("x"));
                }

                Ok(Self {
                    kid: jwk.kid.clone(),
                    algorithm: Algorithm::EdDSA,
                    decoding_key: DecodingKey::from_ed_der(&public_key),
                })
            }
            other => Err(KeyConversionError::Unsupported(other.to_string())),
        }
    }
}

/// One fetched key set. Never mutated after construction.
#[derive(Debug)]
struct KeySetSnapshot {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Instant,
}

impl KeySetSnapshot {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Caching key resolver.
///
/// Shared across requests behind an `Arc`.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,

    /// Current snapshot, swapped whole on refresh.
    cache: RwLock<Option<Arc<KeySetSnapshot>>>,

    /// Serializes refreshes.
    refresh_lock: Mutex<()>,

    /// Completed fetch attempts, successful or not.
    attempts: AtomicU64,

    refresh_cooldown: Duration,
    max_age: Duration,
}

impl JwksClient {
    /// Create a resolver with the default cooldown and max age.
    pub fn new(jwks_url: String) -> Self {
        Self::with_cache_policy(
            jwks_url,
            Duration::from_secs(DEFAULT_REFRESH_COOLDOWN_SECONDS),
            Duration::from_secs(DEFAULT_MAX_AGE_SECONDS),
        )
    }

    /// Create a resolver with an explicit refresh cooldown and max age.
    pub fn with_cache_policy(jwks_url: String, refresh_cooldown: Duration, max_age: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "dashboard.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            refresh_cooldown,
            max_age,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Resolve a key id to a verification key.
    ///
    /// # Errors
    ///
    /// - `CredentialError::UnknownKey` - `kid` is not in the key set, after a
    ///   refresh if one was allowed
    /// - `CredentialError::KeySetFetch` - a needed refresh failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<VerificationKey, CredentialError> {
        let current = self.current().await;

        if let Some(snapshot) = &current {
            let age = snapshot.age();
            if age < self.max_age {
                if let Some(key) = snapshot.keys.get(kid) {
                    tracing::debug!(target: "dashboard.auth.jwks", kid = %kid, "JWKS cache hit");
                    return Ok(key.clone());
                }
                if age < self.refresh_cooldown {
                    tracing::debug!(
                        target: "dashboard.auth.jwks",
                        kid = %kid,
                        "Key not in JWKS cache, refresh on cooldown"
                    );
                    return Err(CredentialError::UnknownKey);
                }
            } else {
                tracing::debug!(target: "dashboard.auth.jwks", "JWKS cache past max age");
            }
        }

        let observed = current.as_ref().map(|snapshot| snapshot.fetched_at);
        let snapshot = self.refresh_after(observed).await?;

        match snapshot.keys.get(kid) {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::warn!(target: "dashboard.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                Err(CredentialError::UnknownKey)
            }
        }
    }

    /// Fetch the key set unconditionally and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::KeySetFetch` if the document cannot be fetched.
    pub async fn force_refresh(&self) -> Result<(), CredentialError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await.map(|_| ())
    }

    /// Make sure a snapshot exists, fetching one if the cache is empty.
    ///
    /// Used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::KeySetFetch` if the first fetch fails.
    pub async fn ensure_loaded(&self) -> Result<(), CredentialError> {
        if self.current().await.is_some() {
            return Ok(());
        }
        self.refresh_after(None).await.map(|_| ())
    }

    /// Number of keys in the current snapshot, if any.
    pub async fn cached_key_count(&self) -> Option<usize> {
        self.current().await.map(|snapshot| snapshot.keys.len())
    }

    async fn current(&self) -> Option<Arc<KeySetSnapshot>> {
        self.cache.read().await.clone()
    }

    /// Refresh unless another task already replaced the snapshot that was
    /// observed (identified by its fetch time) while we waited for the lock.
    ///
    /// A fetch that finished while we waited counts as our attempt: if it
    /// failed, the failure is returned without fetching again.
    async fn refresh_after(
        &self,
        observed: Option<Instant>,
    ) -> Result<Arc<KeySetSnapshot>, CredentialError> {
        let attempts_before = self.attempts.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        let current = self.current().await;
        if let Some(snapshot) = &current {
            if Some(snapshot.fetched_at) != observed {
                tracing::debug!(target: "dashboard.auth.jwks", "JWKS refreshed by a concurrent request");
                return Ok(Arc::clone(snapshot));
            }
        }

        if self.attempts.load(Ordering::Acquire) != attempts_before {
            tracing::debug!(
                target: "dashboard.auth.jwks",
                "JWKS refresh by a concurrent request failed"
            );
            return Err(CredentialError::KeySetFetch);
        }

        self.fetch_and_store().await
    }

    /// Fetch, convert and publish a new snapshot. Caller holds `refresh_lock`.
    async fn fetch_and_store(&self) -> Result<Arc<KeySetSnapshot>, CredentialError> {
        let start = Instant::now();
        let result = self.fetch().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        metrics::record_jwks_refresh(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );

        let keys = result?;
        let snapshot = Arc::new(KeySetSnapshot {
            keys,
            fetched_at: Instant::now(),
        });

        tracing::info!(
            target: "dashboard.auth.jwks",
            key_count = snapshot.keys.len(),
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<HashMap<String, VerificationKey>, CredentialError> {
        tracing::debug!(target: "dashboard.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "dashboard.auth.jwks", error = %e, "Failed to fetch JWKS");
                CredentialError::KeySetFetch
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "dashboard.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(CredentialError::KeySetFetch);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "dashboard.auth.jwks", error = %e, "Failed to parse JWKS response");
            CredentialError::KeySetFetch
        })?;

        Ok(build_key_map(jwks))
    }

    /// Shift the snapshot's fetch time into the past.
    #[cfg(test)]
    async fn backdate(&self, by: Duration) {
        let mut cache = self.cache.write().await;
        if let Some(snapshot) = cache.as_ref() {
            let fetched_at = snapshot.fetched_at.checked_sub(by).unwrap_or(snapshot.fetched_at);
            *cache = Some(Arc::new(KeySetSnapshot {
                keys: snapshot.keys.clone(),
                fetched_at,
            }));
        }
    }
}

/// Convert a key set document into a `kid` -> key map, skipping unusable entries.
fn build_key_map(jwks: JwksResponse) -> HashMap<String, VerificationKey> {
    let mut keys = HashMap::with_capacity(jwks.keys.len());

    for jwk in &jwks.keys {
        if jwk.kid.is_empty() {
            tracing::warn!(target: "dashboard.auth.jwks", kty = %jwk.kty, "Skipping JWK without kid");
            continue;
        }
        match VerificationKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(key.kid.clone(), key);
            }
            Err(e) => {
                tracing::warn!(
                    target: "dashboard.auth.jwks",
                    kid = %jwk.kid,
                    error = %e,
                    "Skipping unusable JWK"
                );
            }
        }
    }

    keys
}
