//! Permission guard.
//!
//! Each protected operation declares one required permission. A token lacking
//! the `permissions` claim entirely is a misconfigured token (400); a token
//! whose grant excludes the permission is an under-privileged caller (403).

use crate::auth::claims::Claims;
use crate::errors::AuthError;
use std::fmt;

/// A permission string required by a protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequiredPermission(&'static str);

impl RequiredPermission {
    pub const GET_DRINKS_DETAIL: RequiredPermission = RequiredPermission("get:drinks-detail");
    pub const POST_DRINKS: RequiredPermission = RequiredPermission("post:drinks");
    pub const PATCH_DRINKS: RequiredPermission = RequiredPermission("patch:drinks");
    pub const DELETE_DRINKS: RequiredPermission = RequiredPermission("delete:drinks");

    pub const fn new(permission: &'static str) -> Self {
        Self(permission)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Check that `claims` grants `required`.
///
/// # Errors
///
/// - `PermissionsClaimMissing` - no `permissions` claim
/// - `PermissionDenied` - `required` not among the granted permissions
pub fn check_permission(required: RequiredPermission, claims: &Claims) -> Result<(), AuthError> {
    if claims.permissions.is_none() {
        tracing::debug!(
            target: "drinks.auth.permissions",
            required = %required,
            "Token has no permissions claim"
        );
        return Err(AuthError::PermissionsClaimMissing);
    }

    if !claims.has_permission(required.as_str()) {
        tracing::debug!(
            target: "drinks.auth.permissions",
            required = %required,
            "Permission not granted"
        );
        return Err(AuthError::PermissionDenied);
    }

    Ok(())
}
