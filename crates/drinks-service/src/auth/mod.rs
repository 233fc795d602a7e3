//! Authentication and authorization gateway.
//!
//! - `extract` - bearer token from the `Authorization` header
//! - `jwks` - key set resolution and caching
//! - `jwt` - signature and registered claim verification
//! - `permissions` - per-operation permission checks
//! - `claims` - verified claim set handed to handlers

pub mod claims;
pub mod extract;
pub mod jwks;
pub mod jwt;
pub mod permissions;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::Claims;
pub use common::jwt::RS256;
pub use extract::extract_bearer_token;
pub use jwks::{JwksClient, JwksOptions, KeySet, KeySetProvider, SigningKey};
pub use jwt::{verify_token, JwtValidator, ValidationSettings};
pub use permissions::{check_permission, RequiredPermission};
