//! Drinks Service error types.
//!
//! `AuthError` is the closed set of gateway failures. `ApiError` is the
//! service boundary error and the only type converted into an HTTP response.
//! Messages returned to clients stay generic; details are logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Value of the `WWW-Authenticate` header on 401 responses.
pub const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"drinks-api\", error=\"invalid_token\"";

/// Authentication and authorization failures.
///
/// Maps to HTTP status codes:
/// - Header, token and claim failures: 401 Unauthorized
/// - PermissionsClaimMissing: 400 Bad Request
/// - PermissionDenied: 403 Forbidden
/// - KeySetUnavailable: 503 Service Unavailable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingAuthorizationHeader,

    #[error("Authorization header must have exactly two parts")]
    MalformedAuthorizationHeader,

    #[error("Authorization header must start with Bearer")]
    UnsupportedScheme,

    #[error("Token header is invalid")]
    InvalidTokenHeader,

    #[error("Token algorithm is not supported")]
    UnsupportedAlgorithm,

    #[error("Unable to find the appropriate key")]
    SigningKeyNotFound,

    #[error("Signing key could not be used")]
    InvalidSigningKey,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token expired")]
    TokenExpired,

    #[error("Incorrect claims. Please check the audience and issuer")]
    InvalidClaims,

    #[error("Token not valid")]
    InvalidToken,

    #[error("Permissions not included in JWT")]
    PermissionsClaimMissing,

    #[error("Permission not found")]
    PermissionDenied,

    #[error("Signing keys are unavailable")]
    KeySetUnavailable,
}

impl AuthError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorizationHeader | AuthError::PermissionDenied => "unauthorized",
            AuthError::MalformedAuthorizationHeader
            | AuthError::UnsupportedScheme
            | AuthError::InvalidTokenHeader
            | AuthError::UnsupportedAlgorithm
            | AuthError::InvalidSigningKey => "invalid_header",
            AuthError::SigningKeyNotFound => "signing_key_not_found",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims | AuthError::PermissionsClaimMissing => "invalid_claims",
            AuthError::InvalidToken => "invalid_token",
            AuthError::KeySetUnavailable => "key_set_unavailable",
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::PermissionsClaimMissing => 400,
            AuthError::PermissionDenied => 403,
            AuthError::KeySetUnavailable => 503,
            _ => 401,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        format!("{}.", self)
    }
}

/// Drinks Service error type.
///
/// Maps to HTTP status codes:
/// - Auth: per [`AuthError::status_code`]
/// - NotFound: 404 Not Found
/// - Unprocessable: 422 Unprocessable Entity
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Auth(err) => err.status_code(),
            ApiError::NotFound(_) => 404,
            ApiError::Unprocessable(_) => 422,
            ApiError::Database(_) | ApiError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (message, code, description) = match &self {
            ApiError::Auth(err) => {
                let message = match err.status_code() {
                    400 => "bad request",
                    403 => "forbidden",
                    503 => {
                        tracing::warn!(target: "drinks.availability", "Signing keys unavailable");
                        "Authentication service unavailable"
                    }
                    _ => "Not authorized",
                };
                (
                    message.to_string(),
                    Some(err.code()),
                    Some(err.description()),
                )
            }
            ApiError::NotFound(message) => (message.clone(), None, None),
            ApiError::Unprocessable(reason) => {
                tracing::debug!(target: "drinks.handlers", reason = %reason, "Request unprocessable");
                ("unprocessable".to_string(), None, None)
            }
            ApiError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "drinks.repository", error = %err, "Database operation failed");
                ("internal server error".to_string(), None, None)
            }
            ApiError::Internal => ("internal server error".to_string(), None, None),
        };

        let body = ErrorResponse {
            success: false,
            error: status.as_u16(),
            message,
            code,
            description,
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
            );
        }

        response
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Unprocessable("A drink with this title already exists".to_string())
            }
            _ => ApiError::Database(err.to_string()),
        }
    }
}
