//! In-memory key set providers for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::auth::jwks::{JwksResponse, KeySet, KeySetProvider};
use crate::auth::jwt::ValidationSettings;
use crate::errors::AuthError;
use async_trait::async_trait;
use drinks_test_utils::crypto_fixtures::{jwks_json, TestSigningKey};
use drinks_test_utils::token_builders::{TEST_AUDIENCE, TEST_ISSUER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn key_set(keys: &[&TestSigningKey]) -> KeySet {
    let jwks: JwksResponse = serde_json::from_value(jwks_json(keys)).unwrap();
    KeySet::from_jwks(jwks)
}

pub fn test_settings() -> ValidationSettings {
    ValidationSettings::new(TEST_ISSUER, TEST_AUDIENCE)
}

/// Fixed current set, plus an optional set served after a miss.
pub struct StaticKeys {
    current: Arc<KeySet>,
    after_miss: Option<Arc<KeySet>>,
    current_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl StaticKeys {
    pub fn new(current: KeySet, after_miss: Option<KeySet>) -> Arc<Self> {
        Arc::new(Self {
            current: Arc::new(current),
            after_miss: after_miss.map(Arc::new),
            current_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetProvider for StaticKeys {
    async fn current(&self) -> Result<Arc<KeySet>, AuthError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.current))
    }

    async fn refresh_after_miss(&self, _kid: &str) -> Result<Option<Arc<KeySet>>, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.after_miss.clone())
    }
}

/// Provider whose endpoint is down.
pub struct UnavailableKeys;

#[async_trait]
impl KeySetProvider for UnavailableKeys {
    async fn current(&self) -> Result<Arc<KeySet>, AuthError> {
        Err(AuthError::KeySetUnavailable)
    }

    async fn refresh_after_miss(&self, _kid: &str) -> Result<Option<Arc<KeySet>>, AuthError> {
        Err(AuthError::KeySetUnavailable)
    }
}
