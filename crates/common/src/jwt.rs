//! JWT utilities shared across coffee shop services.
//!
//! This module provides the pieces of token handling that happen BEFORE a
//! signing key is known:
//! - Size limits for DoS prevention
//! - Leeway constants for `exp` validation
//! - Structural checks (three base64url segments)
//! - Unverified header parsing (`alg`, `kid`)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned here is trusted: the header is only used to pick a key
//!   and to reject algorithms early. Signature verification happens later.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_unverified_header, RS256};
//!
//! let header = parse_unverified_header(token)?;
//! if header.alg != RS256 {
//!     return Err(...);
//! }
//! let key = key_set.get(&header.kid);
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Identity provider access tokens are typically under
/// 2KB even with a long `permissions` array.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// The only signature algorithm accepted by the gateway.
pub const RS256: &str = "RS256";

/// Default leeway applied to `exp` validation (none).
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Maximum allowed leeway (10 minutes).
///
/// Prevents misconfiguration from silently accepting long-expired tokens.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a token before verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtHeaderError {
    /// Token size exceeds maximum allowed.
    #[error("Token exceeds maximum size")]
    TokenTooLarge,

    /// Token is not three base64url segments, or the header is not a JSON object.
    #[error("Token is not a well-formed JWT")]
    MalformedToken,

    /// Header has no usable `alg`.
    #[error("Token header is missing an algorithm")]
    MissingAlg,

    /// Header has no usable `kid`.
    #[error("Token header is missing a key identifier")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The subset of the JOSE header needed to select a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signature algorithm (untrusted).
    pub alg: String,

    /// Declared key identifier (untrusted).
    pub kid: String,

    /// Declared token type, if any.
    pub typ: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    typ: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Returns true if `segment` is non-empty and uses only the base64url alphabet
/// (no padding).
fn is_base64url_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Parse the JOSE header of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The returned values MUST only be used for key lookup and early algorithm
///   rejection; the token still has to be verified afterwards
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not three base64url segments, bad base64, or header is
///   not a JSON object
/// - `MissingAlg` - `alg` absent, not a string, or empty
/// - `MissingKid` - `kid` absent, not a string, or empty
pub fn parse_unverified_header(token: &str) -> Result<TokenHeader, JwtHeaderError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtHeaderError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || !parts.iter().all(|p| is_base64url_segment(p)) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtHeaderError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtHeaderError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtHeaderError::MalformedToken
    })?;

    // Only an object is a header; serde would also map an array onto the
    // struct fields by position
    let object = match serde_json::from_slice(&header_bytes) {
        Ok(serde_json::Value::Object(object)) => object,
        Ok(_) => {
            tracing::debug!(target: "common.jwt", "JWT header is not a JSON object");
            return Err(JwtHeaderError::MalformedToken);
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
            return Err(JwtHeaderError::MalformedToken);
        }
    };
    let raw: RawHeader = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|_| JwtHeaderError::MalformedToken)?;

    let alg = non_empty_string(raw.alg).ok_or(JwtHeaderError::MissingAlg)?;
    // Empty kid is rejected: it can never select a published key
    let kid = non_empty_string(raw.kid).ok_or(JwtHeaderError::MissingKid)?;
    let typ = non_empty_string(raw.typ);

    Ok(TokenHeader { alg, kid, typ })
}

fn non_empty_string(value: Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn kid_of(token: &str) -> Result<String, JwtHeaderError> {
        parse_unverified_header(token).map(|header| header.kid)
    }

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.cGF5bG9hZA.c2lnbmF0dXJl")
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_leeway_bounds() {
        assert_eq!(DEFAULT_LEEWAY, Duration::ZERO);
        assert_eq!(MAX_LEEWAY, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);

        let header = parse_unverified_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid, "key-01");
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_parse_header_without_typ() {
        let token = token_with_header(r#"{"alg":"RS256","kid":"key-01"}"#);

        let header = parse_unverified_header(&token).unwrap();
        assert!(header.typ.is_none());
    }

    #[test]
    fn test_parse_header_reports_foreign_algorithm() {
        // Algorithm policy is the verifier's job; the header is still parsed
        let token = token_with_header(r#"{"alg":"HS256","kid":"key-01"}"#);

        let header = parse_unverified_header(&token).unwrap();
        assert_eq!(header.alg, "HS256");
    }

    #[test]
    fn test_parse_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);
        assert_eq!(
            parse_unverified_header(&token),
            Err(JwtHeaderError::MissingKid)
        );
    }

    #[test]
    fn test_parse_header_empty_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":""}"#);
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MissingKid));
    }

    #[test]
    fn test_parse_header_non_string_kid() {
        let token = token_with_header(r#"{"alg":"RS256","kid":12345}"#);
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MissingKid));

        let token = token_with_header(r#"{"alg":"RS256","kid":null}"#);
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MissingKid));
    }

    #[test]
    fn test_parse_header_missing_alg() {
        let token = token_with_header(r#"{"kid":"key-01"}"#);
        assert_eq!(
            parse_unverified_header(&token),
            Err(JwtHeaderError::MissingAlg)
        );
    }

    #[test]
    fn test_parse_header_wrong_segment_count() {
        assert_eq!(
            kid_of("not-a-jwt"),
            Err(JwtHeaderError::MalformedToken)
        );
        assert_eq!(kid_of("only.two"), Err(JwtHeaderError::MalformedToken));
        assert_eq!(
            kid_of("a.b.c.d.e"),
            Err(JwtHeaderError::MalformedToken)
        );
        assert_eq!(kid_of(""), Err(JwtHeaderError::MalformedToken));
    }

    #[test]
    fn test_parse_header_empty_segments() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","kid":"key-01"}"#);
        // alg:none tokens usually carry an empty signature segment
        let token = format!("{header_b64}.cGF5bG9hZA.");
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MalformedToken));

        assert_eq!(
            kid_of(".payload.signature"),
            Err(JwtHeaderError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_header_rejects_non_base64url_characters() {
        assert_eq!(
            kid_of("!!!invalid!!!.payload.signature"),
            Err(JwtHeaderError::MalformedToken)
        );
        // Standard base64 with padding is not base64url
        assert_eq!(
            kid_of("eyJhbGciOiJSUzI1NiJ9.cGF5bG9hZA==.c2ln"),
            Err(JwtHeaderError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_header_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MalformedToken));

        // Valid base64url that decodes to garbage bytes
        assert_eq!(
            kid_of("abc.def.ghi"),
            Err(JwtHeaderError::MalformedToken)
        );
    }

    #[test]
    fn test_parse_header_json_array_is_malformed() {
        let token = token_with_header(r#"["RS256","key-01"]"#);
        assert_eq!(kid_of(&token), Err(JwtHeaderError::MalformedToken));

        for scalar in [r#""RS256""#, "null", "42"] {
            let token = token_with_header(scalar);
            assert_eq!(kid_of(&token), Err(JwtHeaderError::MalformedToken));
        }
    }

    #[test]
    fn test_parse_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            parse_unverified_header(&oversized),
            Err(JwtHeaderError::TokenTooLarge)
        );
    }

    #[test]
    fn test_parse_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"key"}"#);
        // header.payload.signature (2 dots)
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let sig_len = remaining - payload_len;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(sig_len)
        );

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert_eq!(kid_of(&token).unwrap(), "key");
    }

    #[test]
    fn test_parse_header_kid_with_special_characters() {
        let token = token_with_header(r#"{"alg":"RS256","kid":"key-with-special_chars.123"}"#);
        assert_eq!(kid_of(&token).unwrap(), "key-with-special_chars.123");
    }
}
