//! Builder patterns for test token construction
//!
//! Provides a fluent API for identity-provider style access tokens.

use crate::crypto_fixtures::TestSigningKey;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Identity provider domain used by test configuration.
pub const TEST_DOMAIN: &str = "test-tenant.example.com";

/// Issuer the service expects for [`TEST_DOMAIN`].
pub const TEST_ISSUER: &str = "https://test-tenant.example.com/";

/// Audience the service expects.
pub const TEST_AUDIENCE: &str = "coffeeshop";

/// Builder for test access token claims
///
/// Defaults produce a token the test server accepts for authentication,
/// with an empty `permissions` claim.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("auth0|barista")
///     .with_permissions(&["get:drinks-detail"])
///     .expires_in(3600)
///     .sign(&primary_signing_key());
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("auth0|test-subject"));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("permissions".to_string(), json!([]));
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single audience string
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set an audience array
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Set the granted permissions
    pub fn with_permissions(self, permissions: &[&str]) -> Self {
        self.with_claim("permissions", json!(permissions))
    }

    /// Drop the `permissions` claim entirely
    pub fn without_permissions(self) -> Self {
        self.without_claim("permissions")
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Expired an hour ago
    pub fn expired(self) -> Self {
        self.expires_in(-3600)
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign the claims as an RS256 token with `key`
    pub fn sign(&self, key: &TestSigningKey) -> String {
        key.sign(&self.claims())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
