//! Middleware for the Drinks Service.

pub mod auth;
pub mod http_metrics;

pub use auth::{require_permission, AuthState, PermissionGate};
pub use http_metrics::http_metrics_middleware;
