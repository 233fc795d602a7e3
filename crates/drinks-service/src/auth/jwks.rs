//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! The client fetches `{"keys": [...]}` from the provider's
//! `/.well-known/jwks.json` endpoint and exposes it as an immutable
//! [`KeySet`] snapshot.
//!
//! # Security
//!
//! - Every fetch is bounded by a timeout; one retry with backoff is attempted
//! - Snapshots are swapped wholesale, never mutated in place
//! - Forced refreshes on unknown `kid` are rate-limited so garbage tokens
//!   cannot hammer the provider
//! - Keys that cannot verify RS256 signatures are dropped at load time

use crate::auth::RS256;
use crate::errors::AuthError;
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Backoff before the single retry of a failed fetch.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for RS256 keys).
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use ("sig" for signing keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// One usable RSA signing key from the key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub key_type: String,
    pub key_id: String,
    pub usage: Option<String>,
    pub modulus: String,
    pub exponent: String,
}

impl SigningKey {
    /// Build the RSA decoding key from the modulus and exponent.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        DecodingKey::from_rsa_components(&self.modulus, &self.exponent).map_err(|e| {
            tracing::warn!(
                target: "drinks.auth.jwks",
                kid = %self.key_id,
                error = %e,
                "Published signing key could not be decoded"
            );
            AuthError::InvalidSigningKey
        })
    }

    fn from_jwk(jwk: Jwk) -> Option<Self> {
        let key_id = jwk.kid.filter(|kid| !kid.is_empty())?;
        let key_type = jwk.kty?;
        if key_type != "RSA" {
            return None;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            return None;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != RS256) {
            return None;
        }
        Some(SigningKey {
            key_type,
            key_id,
            usage: jwk.key_use,
            modulus: jwk.n?,
            exponent: jwk.e?,
        })
    }
}

/// Ordered collection of signing keys, indexed by key id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    index: HashMap<String, usize>,
}

impl KeySet {
    /// Build a key set from signing keys. On duplicate key ids the first
    /// key wins.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        let mut set = KeySet::default();
        for key in keys {
            if set.index.contains_key(&key.key_id) {
                tracing::debug!(target: "drinks.auth.jwks", kid = %key.key_id, "Duplicate key id ignored");
                continue;
            }
            set.index.insert(key.key_id.clone(), set.keys.len());
            set.keys.push(key);
        }
        set
    }

    /// Build a key set from a JWKS document, skipping keys unusable for RS256.
    pub fn from_jwks(jwks: JwksResponse) -> Self {
        let published = jwks.keys.len();
        let set = Self::new(jwks.keys.into_iter().filter_map(SigningKey::from_jwk));
        if set.len() < published {
            tracing::debug!(
                target: "drinks.auth.jwks",
                published,
                usable = set.len(),
                "Skipped keys not usable for RS256 signatures"
            );
        }
        set
    }

    /// Look up a key by key id.
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.index.get(kid).and_then(|&i| self.keys.get(i))
    }

    /// Keys in publication order.
    pub fn keys(&self) -> &[SigningKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of the current key set.
///
/// Implemented by [`JwksClient`]; tests use fixed in-memory sets.
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    /// The key set to verify against right now.
    async fn current(&self) -> Result<Arc<KeySet>, AuthError>;

    /// Called when `kid` was not found in the set returned by `current`.
    ///
    /// Returns a newer key set to retry against, or `None` when no newer
    /// set can be obtained (refresh rate-limited or caching disabled).
    async fn refresh_after_miss(&self, kid: &str) -> Result<Option<Arc<KeySet>>, AuthError>;
}

/// JWKS client tuning.
#[derive(Debug, Clone)]
pub struct JwksOptions {
    /// How long a fetched key set is served from cache. Zero disables caching.
    pub cache_ttl: Duration,

    /// Timeout for a single fetch attempt.
    pub fetch_timeout: Duration,

    /// Minimum time since the last fetch attempt, successful or not, before
    /// an unknown `kid` forces another one.
    pub min_refresh_interval: Duration,

    /// Delay before retrying a failed fetch.
    pub retry_backoff: Duration,
}

impl Default for JwksOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
            min_refresh_interval: Duration::from_secs(30),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Cached key set with fetch time.
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// JWKS client for fetching and caching signing keys.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Most recent snapshot. Only locked for reads and swaps, never across a fetch.
    cache: RwLock<Option<CachedKeySet>>,

    /// Serializes cache refreshes and holds when the last one started,
    /// whether or not it succeeded.
    last_refresh_attempt: Mutex<Option<Instant>>,

    options: JwksOptions,
}

impl JwksClient {
    /// Create a new JWKS client.
    pub fn new(jwks_url: String, options: JwksOptions) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(options.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "drinks.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            last_refresh_attempt: Mutex::new(None),
            options,
        }
    }

    fn caching_enabled(&self) -> bool {
        !self.options.cache_ttl.is_zero()
    }

    /// Fetch the key set from the provider, retrying once after a backoff.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` if both attempts fail.
    #[instrument(skip_all, name = "drinks.auth.jwks.fetch")]
    pub async fn fetch_keys(&self) -> Result<KeySet, AuthError> {
        match self.fetch_once().await {
            Ok(keys) => Ok(keys),
            Err(()) => {
                tracing::warn!(
                    target: "drinks.auth.jwks",
                    backoff_ms = self.options.retry_backoff.as_millis() as u64,
                    "JWKS fetch failed, retrying once"
                );
                tokio::time::sleep(self.options.retry_backoff).await;
                self.fetch_once().await.map_err(|()| {
                    tracing::error!(target: "drinks.auth.jwks", url = %self.jwks_url, "JWKS unavailable after retry");
                    AuthError::KeySetUnavailable
                })
            }
        }
    }

    async fn fetch_once(&self) -> Result<KeySet, ()> {
        let start = Instant::now();
        let result = self.request_keys().await;
        metrics::record_jwks_fetch(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );
        result
    }

    async fn request_keys(&self) -> Result<KeySet, ()> {
        tracing::debug!(target: "drinks.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "drinks.auth.jwks", error = %e, "Failed to fetch JWKS");
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "drinks.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(());
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "drinks.auth.jwks", error = %e, "Failed to parse JWKS response");
        })?;

        let keys = KeySet::from_jwks(jwks);
        tracing::info!(target: "drinks.auth.jwks", key_count = keys.len(), "JWKS fetched");
        Ok(keys)
    }

    /// Fetch a new snapshot and swap it in.
    ///
    /// Caller holds the `last_refresh_attempt` guard; the cache lock is only
    /// taken for the swap so readers of the old snapshot never wait on the
    /// provider.
    async fn refresh(&self, last_attempt: &mut Option<Instant>) -> Result<Arc<KeySet>, AuthError> {
        *last_attempt = Some(Instant::now());
        let keys = Arc::new(self.fetch_keys().await?);
        *self.cache.write().await = Some(CachedKeySet {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    async fn fresh_snapshot(&self) -> Option<Arc<KeySet>> {
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.options.cache_ttl)
            .map(|cached| Arc::clone(&cached.keys))
    }

    async fn snapshot_with(&self, kid: &str) -> Option<Arc<KeySet>> {
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.keys.get(kid).is_some())
            .map(|cached| Arc::clone(&cached.keys))
    }
}

#[async_trait]
impl KeySetProvider for JwksClient {
    async fn current(&self) -> Result<Arc<KeySet>, AuthError> {
        if !self.caching_enabled() {
            return self.fetch_keys().await.map(Arc::new);
        }

        if let Some(keys) = self.fresh_snapshot().await {
            tracing::debug!(target: "drinks.auth.jwks", "JWKS cache hit");
            return Ok(keys);
        }

        let mut last_attempt = self.last_refresh_attempt.lock().await;
        // Another task may have refreshed while we waited
        if let Some(keys) = self.fresh_snapshot().await {
            return Ok(keys);
        }
        self.refresh(&mut last_attempt).await
    }

    async fn refresh_after_miss(&self, kid: &str) -> Result<Option<Arc<KeySet>>, AuthError> {
        if !self.caching_enabled() {
            // The set was fetched for this very request
            return Ok(None);
        }

        if let Some(keys) = self.snapshot_with(kid).await {
            return Ok(Some(keys));
        }

        let mut last_attempt = self.last_refresh_attempt.lock().await;
        if let Some(keys) = self.snapshot_with(kid).await {
            return Ok(Some(keys));
        }
        if (*last_attempt).is_some_and(|at| at.elapsed() < self.options.min_refresh_interval) {
            tracing::debug!(target: "drinks.auth.jwks", kid = %kid, "Forced JWKS refresh rate-limited");
            return Ok(None);
        }

        tracing::info!(target: "drinks.auth.jwks", kid = %kid, "Unknown key id, refreshing JWKS");
        self.refresh(&mut last_attempt).await.map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rsa_jwk(kid: &str) -> serde_json::Value {
        json!({"kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": "yrs9VakT9W2_vnKtVhkCwhOsHY-hxb-oRRahBXkgbxGn3ES4DncA7dpeB68bdCW0mr4FXzeyFj1xXre0Tte_xolkR7R8RsW_rmG5stVDhBa70aQOWxePnu8XyFPOKPHMdGlG4tbf3dLqStKcZB68SbAxlyvH9jLVpxV_azVslc8o136PTmCq1HS6pG88r2sR2QvCCsX8ZKkfzV3jgdHIbsuxEGnDTOsk9UfWv6JgdY55JR-ir_rN0pqNGhCcNS_LsoX7FHl62vtgsnIjFhZt5bZFmFNVSOUJI7rBaTPTs13_2I6wYzoVhXO0TKyzONP6R_a9C2ulS-dR68bmniH44Q", "e": "AQAB"})
    }

    fn test_options() -> JwksOptions {
        JwksOptions {
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(2),
            min_refresh_interval: Duration::ZERO,
            retry_backoff: Duration::from_millis(10),
        }
    }

    async fn serve_jwks(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer, options: JwksOptions) -> JwksClient {
        JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()), options)
    }

    #[test]
    fn test_jwk_deserialization() {
        let jwk: Jwk = serde_json::from_value(rsa_jwk("key-01")).unwrap();

        assert_eq!(jwk.kty.as_deref(), Some("RSA"));
        assert_eq!(jwk.kid.as_deref(), Some("key-01"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
    }

    #[test]
    fn test_jwk_deserialization_ignores_extra_fields() {
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "RSA",
            "kid": "key-01",
            "n": "abc",
            "e": "AQAB",
            "x5c": ["MIIC..."],
            "x5t": "thumb"
        }))
        .unwrap();

        assert!(jwk.key_use.is_none());
        assert!(jwk.alg.is_none());
    }

    #[test]
    fn test_key_set_filters_unusable_keys() {
        let jwks: JwksResponse = serde_json::from_value(json!({
            "keys": [
                rsa_jwk("rsa-sig"),
                {"kty": "RSA", "kid": "rsa-no-use", "n": "abc", "e": "AQAB"},
                {"kty": "RSA", "kid": "rsa-enc", "use": "enc", "n": "abc", "e": "AQAB"},
                {"kty": "OKP", "kid": "ed25519", "crv": "Ed25519", "x": "abc"},
                {"kty": "RSA", "kid": "rsa-ps", "alg": "PS256", "n": "abc", "e": "AQAB"},
                {"kty": "RSA", "kid": "rsa-missing-n", "e": "AQAB"},
                {"kty": "RSA", "n": "abc", "e": "AQAB"}
            ]
        }))
        .unwrap();

        let set = KeySet::from_jwks(jwks);

        let kids: Vec<&str> = set.keys().iter().map(|k| k.key_id.as_str()).collect();
        assert_eq!(kids, vec!["rsa-sig", "rsa-no-use"]);
        assert!(set.get("rsa-enc").is_none());
        assert!(set.get("ed25519").is_none());
    }

    #[test]
    fn test_key_set_duplicate_kid_first_wins() {
        let first = SigningKey {
            key_type: "RSA".to_string(),
            key_id: "dup".to_string(),
            usage: Some("sig".to_string()),
            modulus: "first".to_string(),
            exponent: "AQAB".to_string(),
        };
        let second = SigningKey {
            modulus: "second".to_string(),
            ..first.clone()
        };

        let set = KeySet::new([first, second]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("dup").unwrap().modulus, "first");
    }

    #[test]
    fn test_empty_key_set() {
        let set = KeySet::from_jwks(JwksResponse { keys: vec![] });
        assert!(set.is_empty());
        assert!(set.get("anything").is_none());
    }

    #[test]
    fn test_decoding_key_from_valid_components() {
        let jwk: Jwk = serde_json::from_value(rsa_jwk("key-01")).unwrap();
        let key = SigningKey::from_jwk(jwk).unwrap();
        assert!(key.decoding_key().is_ok());
    }

    #[test]
    fn test_decoding_key_rejects_bad_base64() {
        let key = SigningKey {
            key_type: "RSA".to_string(),
            key_id: "broken".to_string(),
            usage: None,
            modulus: "!!!not base64!!!".to_string(),
            exponent: "AQAB".to_string(),
        };
        assert_eq!(key.decoding_key().err(), Some(AuthError::InvalidSigningKey));
    }

    #[test]
    fn test_default_options() {
        let options = JwksOptions::default();
        assert_eq!(options.cache_ttl, Duration::from_secs(300));
        assert_eq!(options.min_refresh_interval, Duration::from_secs(30));
        assert_eq!(options.retry_backoff, DEFAULT_RETRY_BACKOFF);
    }

    #[tokio::test]
    async fn test_fetch_keys_success() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01"), rsa_jwk("key-02")]})).await;

        let keys = client_for(&server, test_options()).fetch_keys().await.unwrap();

        assert_eq!(keys.len(), 2);
        assert!(keys.get("key-02").is_some());
    }

    #[tokio::test]
    async fn test_fetch_keys_retries_once_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;

        let keys = client_for(&server, test_options()).fetch_keys().await.unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_keys_unavailable_after_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server, test_options()).fetch_keys().await;

        assert_eq!(result, Err(AuthError::KeySetUnavailable));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_keys_malformed_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client_for(&server, test_options()).fetch_keys().await;
        assert_eq!(result, Err(AuthError::KeySetUnavailable));
    }

    #[tokio::test]
    async fn test_fetch_keys_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"keys": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let options = JwksOptions {
            fetch_timeout: Duration::from_millis(50),
            ..test_options()
        };
        let result = client_for(&server, options).fetch_keys().await;

        assert_eq!(result, Err(AuthError::KeySetUnavailable));
    }

    #[tokio::test]
    async fn test_fetch_keys_unreachable_endpoint() {
        // Port 9 (discard) is not listening in test environments
        let client = JwksClient::new(
            "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            test_options(),
        );
        assert_eq!(client.fetch_keys().await, Err(AuthError::KeySetUnavailable));
    }

    #[tokio::test]
    async fn test_current_uses_cache() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let client = client_for(&server, test_options());

        let first = client.current().await.unwrap();
        let second = client.current().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_current_without_cache_fetches_every_time() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let options = JwksOptions {
            cache_ttl: Duration::ZERO,
            ..test_options()
        };
        let client = client_for(&server, options);

        client.current().await.unwrap();
        client.current().await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        // Nothing newer to offer after a miss when every call fetches
        assert!(client.refresh_after_miss("rotated").await.unwrap().is_none());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_after_miss_picks_up_rotated_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": [rsa_jwk("old")]})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("old"), rsa_jwk("new")]})).await;
        let client = client_for(&server, test_options());

        let before = client.current().await.unwrap();
        assert!(before.get("new").is_none());

        let after = client.refresh_after_miss("new").await.unwrap().unwrap();
        assert!(after.get("new").is_some());

        // The refreshed set is now the cached one
        let current = client.current().await.unwrap();
        assert!(Arc::ptr_eq(&after, &current));
        // The earlier snapshot is untouched
        assert!(before.get("new").is_none());
    }

    #[tokio::test]
    async fn test_refresh_after_miss_is_rate_limited() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let options = JwksOptions {
            min_refresh_interval: Duration::from_secs(60),
            ..test_options()
        };
        let client = client_for(&server, options);

        client.current().await.unwrap();
        for _ in 0..5 {
            assert!(client.refresh_after_miss("unknown").await.unwrap().is_none());
        }

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_miss_reuses_set_refreshed_by_another_task() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let client = client_for(&server, test_options());

        client.current().await.unwrap();
        let keys = client.refresh_after_miss("key-01").await.unwrap().unwrap();

        assert!(keys.get("key-01").is_some());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_miss_rate_limits_failed_attempts() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let options = JwksOptions {
            min_refresh_interval: Duration::from_millis(100),
            ..test_options()
        };
        let client = client_for(&server, options);
        client.current().await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(
            client.refresh_after_miss("garbage").await,
            Err(AuthError::KeySetUnavailable)
        );
        for _ in 0..4 {
            assert!(client.refresh_after_miss("garbage").await.unwrap().is_none());
        }

        // One attempt plus its retry
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        // The last good set is still served
        assert!(client.current().await.unwrap().get("key-01").is_some());
    }

    #[tokio::test]
    async fn test_current_does_not_wait_for_forced_refresh() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let client = Arc::new(client_for(&server, test_options()));
        client.current().await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"keys": [rsa_jwk("key-01"), rsa_jwk("key-02")]}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let refreshing = Arc::clone(&client);
        let refresh = tokio::spawn(async move { refreshing.refresh_after_miss("key-02").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let keys = tokio::time::timeout(Duration::from_millis(200), client.current())
            .await
            .expect("cached set served while refresh is in flight")
            .unwrap();
        assert!(keys.get("key-01").is_some());

        let refreshed = refresh.await.unwrap().unwrap().unwrap();
        assert!(refreshed.get("key-02").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_refresh() {
        let server = MockServer::start().await;
        serve_jwks(&server, json!({"keys": [rsa_jwk("key-01")]})).await;
        let client = client_for(&server, test_options());
        client.current().await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"keys": [rsa_jwk("key-01"), rsa_jwk("key-02")]}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let (first, second) = tokio::join!(
            client.refresh_after_miss("key-02"),
            client.refresh_after_miss("key-02")
        );

        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
