//! Mock issuer JWKS endpoint.
//!
//! Serves `/.well-known/jwks.json` from a wiremock server. Keys can be
//! rotated and the endpoint taken down mid-test; fetches are counted.

use crate::crypto_fixtures::TestKeypair;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock JWKS endpoint backed by wiremock.
pub struct JwksMock {
    server: MockServer,
}

impl JwksMock {
    /// Start a server publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let mock = Self {
            server: MockServer::start().await,
        };
        mock.publish(keys).await;
        mock
    }

    /// URL of the key set document.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the published key set. Also resets the fetch count.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        let jwks: Vec<serde_json::Value> = keys.iter().map(|k| k.jwk_json()).collect();
        self.publish_raw(serde_json::json!({ "keys": jwks })).await;
    }

    /// Publish an arbitrary document body.
    pub async fn publish_raw(&self, document: serde_json::Value) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Answer every fetch with `status`. Also resets the fetch count.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of key set fetches since the last publish/fail.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|r| r.url.path() == JWKS_PATH)
                    .count()
            })
            .unwrap_or(0)
    }
}
