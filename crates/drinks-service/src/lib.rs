//! Drinks Service Library
//!
//! HTTP service for the coffee shop menu. A single resource ("drinks") is
//! exposed; every write and the detailed listing are guarded by bearer-token
//! authentication against an external identity provider:
//!
//! - RS256 tokens verified against the provider's published JWKS
//! - Issuer, audience and expiry validation
//! - Per-operation permission checks against the token's `permissions` claim
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> repositories/*.rs
//!                        |
//!                        v
//!     auth/extract.rs -> auth/jwt.rs (auth/jwks.rs) -> auth/permissions.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token extraction, key set resolution, verification, permission checks
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authorization and HTTP metrics middleware
//! - `models` - Drink data models and API payloads
//! - `observability` - Prometheus metrics
//! - `repositories` - SQLite persistence for drinks
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
