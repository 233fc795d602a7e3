//! Bearer token extraction from the `Authorization` header.

use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Extract the bearer token from request headers.
///
/// The header must be exactly `<scheme> <token>` (whitespace separated) with
/// a case-insensitive `Bearer` scheme. The token is returned verbatim.
///
/// # Errors
///
/// - `MissingAuthorizationHeader` - header absent or empty
/// - `MalformedAuthorizationHeader` - not visible ASCII, or not two parts
/// - `UnsupportedScheme` - scheme other than `Bearer`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorizationHeader)?;

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedAuthorizationHeader)?;

    if value.trim().is_empty() {
        return Err(AuthError::MissingAuthorizationHeader);
    }

    let mut parts = value.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedAuthorizationHeader);
    };

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedScheme);
    }

    Ok(token)
}
