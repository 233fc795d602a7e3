//! Common utilities and types shared across coffee shop services.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, unverified header parsing, leeway constants)
pub mod jwt;
