//! Authorization middleware for protected routes.
//!
//! Each protected route is wrapped with [`require_permission`] using a
//! [`PermissionGate`] that names the permission the route requires. The
//! middleware runs the full pipeline before the handler is reached:
//!
//! ```text
//! Start -> HeaderExtracted -> Verified -> Authorized -> (handler)
//!   |            |               |
//!   +------------+---------------+--> Rejected (ApiError response)
//! ```
//!
//! On success the verified `Claims` are inserted into request extensions,
//! where handlers read them with `Extension<Claims>`.

use crate::auth::{check_permission, extract_bearer_token, Claims, JwtValidator, RequiredPermission};
use crate::errors::{ApiError, AuthError};
use crate::observability::metrics::record_auth_decision;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

impl AuthState {
    pub fn new(jwt_validator: Arc<JwtValidator>) -> Self {
        Self { jwt_validator }
    }

    /// Middleware state guarding a route with `required`.
    pub fn require(&self, required: RequiredPermission) -> PermissionGate {
        PermissionGate {
            auth: self.clone(),
            required,
        }
    }
}

/// Auth state bound to the permission a route requires.
#[derive(Clone)]
pub struct PermissionGate {
    auth: AuthState,
    required: RequiredPermission,
}

impl PermissionGate {
    pub fn required(&self) -> RequiredPermission {
        self.required
    }
}

/// Last stage reached before a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Start,
    HeaderExtracted,
    Verified,
    Authorized,
}

impl AuthStage {
    fn as_str(self) -> &'static str {
        match self {
            AuthStage::Start => "start",
            AuthStage::HeaderExtracted => "header_extracted",
            AuthStage::Verified => "verified",
            AuthStage::Authorized => "authorized",
        }
    }
}

fn reject(stage: AuthStage, required: RequiredPermission, err: AuthError) -> AuthError {
    tracing::debug!(
        target: "drinks.middleware.auth",
        stage = stage.as_str(),
        permission = %required,
        code = err.code(),
        status = err.status_code(),
        "Request rejected"
    );
    record_auth_decision(required.as_str(), err.code());
    err
}

/// Run extraction, verification and the permission check in order.
///
/// # Errors
///
/// Returns the first stage's `AuthError`; later stages never run.
pub async fn authorize(
    validator: &JwtValidator,
    headers: &HeaderMap,
    required: RequiredPermission,
) -> Result<Claims, AuthError> {
    let token = extract_bearer_token(headers).map_err(|e| reject(AuthStage::Start, required, e))?;

    let claims = validator
        .validate(token)
        .await
        .map_err(|e| reject(AuthStage::HeaderExtracted, required, e))?;

    check_permission(required, &claims).map_err(|e| reject(AuthStage::Verified, required, e))?;

    tracing::debug!(
        target: "drinks.middleware.auth",
        stage = AuthStage::Authorized.as_str(),
        permission = %required,
        "Request authorized"
    );
    record_auth_decision(required.as_str(), "authorized");

    Ok(claims)
}

/// Authorization middleware.
///
/// # Response
///
/// - 401/400/403/503 per `AuthError` if any stage fails; the handler is not run
/// - Otherwise continues to the handler with `Claims` in extensions
#[instrument(skip_all, name = "drinks.middleware.auth")]
pub async fn require_permission(
    State(gate): State<PermissionGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authorize(&gate.auth.jwt_validator, req.headers(), gate.required).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
