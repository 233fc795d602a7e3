//! # Drinks Test Utilities
//!
//! Shared test utilities for the Drinks Service.
//!
//! This crate provides:
//! - Fixed RSA fixtures (two signing keys with stable key ids)
//! - Token builder (`TestTokenBuilder`)
//! - Mock identity provider serving a JWKS document (`MockJwksProvider`)
//! - Server test harness (`TestDrinksServer` for E2E tests)
//! - Response assertions for the error envelope
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drinks_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestDrinksServer::spawn().await?;
//!     let token = TestTokenBuilder::new()
//!         .with_permissions(&["get:drinks-detail"])
//!         .sign(&primary_signing_key());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/drinks-detail", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mock_jwks;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mock_jwks::*;
pub use server_harness::*;
pub use token_builders::*;
