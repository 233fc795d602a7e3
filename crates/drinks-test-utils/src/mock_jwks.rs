//! Mock identity provider serving a JWKS document.
//!
//! Wraps a `wiremock` server that answers `GET /.well-known/jwks.json` with
//! the configured keys, or with a failure status to simulate an outage.

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock JWKS endpoint.
///
/// # Example
/// ```rust,ignore
/// let jwks = MockJwksProvider::start(&[&primary_signing_key()]).await;
/// // Later: rotate to a new key
/// jwks.set_keys(&[&rotated_signing_key()]).await;
/// ```
pub struct MockJwksProvider {
    server: MockServer,
}

impl MockJwksProvider {
    /// Start a mock publishing `keys`.
    pub async fn start(keys: &[&TestSigningKey]) -> Self {
        let provider = Self {
            server: MockServer::start().await,
        };
        provider.set_keys(keys).await;
        provider
    }

    /// Full URL of the key set document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the published key set.
    ///
    /// Resets recorded requests as well.
    pub async fn set_keys(&self, keys: &[&TestSigningKey]) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Answer every fetch with `status`.
    ///
    /// Resets recorded requests as well.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of key set fetches received since the last reset.
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
