//! Token verification.
//!
//! Verifies RS256 access tokens against the identity provider's key set and
//! validates the registered claims (`exp`, `iss`, `aud`).
//!
//! # Security
//!
//! - Token size and header are checked BEFORE any key lookup or network call
//! - Only RS256 is accepted; the algorithm is checked in the unverified header
//!   and pinned again in `jsonwebtoken::Validation`
//! - The `kid` header selects the key; unknown ids trigger at most one
//!   (rate-limited) key set refresh

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeySet, KeySetProvider, SigningKey};
use crate::auth::RS256;
use crate::errors::AuthError;
use common::jwt::{parse_unverified_header, TokenHeader, DEFAULT_LEEWAY};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Registered claims every token must carry.
const REQUIRED_CLAIMS: [&str; 3] = ["exp", "iss", "aud"];

/// Expected issuer, audience and expiry leeway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    pub issuer: String,
    pub audience: String,
    pub leeway: Duration,
}

impl ValidationSettings {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: DEFAULT_LEEWAY,
        }
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

/// Parse the unverified header and enforce the algorithm policy.
fn inspect_header(token: &str) -> Result<TokenHeader, AuthError> {
    let header = parse_unverified_header(token).map_err(|e| {
        tracing::debug!(target: "drinks.auth.jwt", error = %e, "Token header rejected");
        AuthError::InvalidTokenHeader
    })?;

    if header.alg != RS256 {
        tracing::debug!(target: "drinks.auth.jwt", alg = %header.alg, "Token rejected: unsupported algorithm");
        return Err(AuthError::UnsupportedAlgorithm);
    }

    Ok(header)
}

/// Verify a token against a fixed key set.
///
/// # Errors
///
/// - `InvalidTokenHeader` - oversized token, not three base64url segments,
///   or header without `alg`/`kid`
/// - `UnsupportedAlgorithm` - header `alg` is not RS256
/// - `SigningKeyNotFound` - no key in `keys` matches the header `kid`
/// - `InvalidSigningKey` - the matching key cannot be decoded
/// - `InvalidSignature`, `TokenExpired`, `InvalidClaims`, `InvalidToken` -
///   see [`verify_with_key`]
pub fn verify_token(
    token: &str,
    keys: &KeySet,
    settings: &ValidationSettings,
) -> Result<Claims, AuthError> {
    let header = inspect_header(token)?;
    let key = keys.get(&header.kid).ok_or_else(|| {
        tracing::debug!(target: "drinks.auth.jwt", kid = %header.kid, "Signing key not found");
        AuthError::SigningKeyNotFound
    })?;
    verify_with_key(token, key, settings)
}

/// Verify signature and registered claims with a known key.
pub fn verify_with_key(
    token: &str,
    key: &SigningKey,
    settings: &ValidationSettings,
) -> Result<Claims, AuthError> {
    let decoding_key = key.decoding_key()?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[&settings.audience]);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);
    validation.leeway = settings.leeway.as_secs();

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            let err = map_jwt_error(e.kind());
            tracing::debug!(
                target: "drinks.auth.jwt",
                kid = %key.key_id,
                error = %e,
                code = err.code(),
                "Token verification failed"
            );
            err
        })
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer | ErrorKind::MissingRequiredClaim(_) => {
            AuthError::InvalidClaims
        }
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthError::UnsupportedAlgorithm
        }
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => AuthError::InvalidSigningKey,
        _ => AuthError::InvalidToken,
    }
}

/// Verifies tokens against the provider's current key set.
pub struct JwtValidator {
    key_sets: Arc<dyn KeySetProvider>,
    settings: ValidationSettings,
}

impl JwtValidator {
    pub fn new(key_sets: Arc<dyn KeySetProvider>, settings: ValidationSettings) -> Self {
        Self { key_sets, settings }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Validate a token and return its claims.
    ///
    /// The header is inspected before the key set is consulted, so malformed
    /// tokens never cause a fetch. On an unknown `kid` the key set is
    /// refreshed at most once and verification retried.
    #[instrument(skip_all, name = "drinks.auth.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = inspect_header(token)?;
        let keys = self.key_sets.current().await?;

        if let Some(key) = keys.get(&header.kid) {
            return verify_with_key(token, key, &self.settings);
        }

        tracing::debug!(target: "drinks.auth.jwt", kid = %header.kid, "Key id not in current key set");
        let refreshed = self.key_sets.refresh_after_miss(&header.kid).await?;
        match refreshed.as_deref().and_then(|keys| keys.get(&header.kid)) {
            Some(key) => verify_with_key(token, key, &self.settings),
            None => {
                tracing::debug!(target: "drinks.auth.jwt", kid = %header.kid, "Signing key not found");
                Err(AuthError::SigningKeyNotFound)
            }
        }
    }
}
