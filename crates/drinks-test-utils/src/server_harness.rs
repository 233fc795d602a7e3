//! Test server harness for E2E testing
//!
//! Provides `TestDrinksServer` for spawning real Drinks Service instances in
//! tests, backed by an in-memory database and a mock identity provider.

use crate::crypto_fixtures::primary_signing_key;
use crate::mock_jwks::MockJwksProvider;
use crate::token_builders::{TEST_AUDIENCE, TEST_DOMAIN};
use drinks_service::config::Config;
use drinks_service::models::Drink;
use drinks_service::observability::metrics::init_metrics_recorder;
use drinks_service::repositories::{self, DrinksRepository};
use drinks_service::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
///
/// The Prometheus recorder can only be installed once per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics handle shared by all test servers in the process.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the Drinks Service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_menu_is_public() -> Result<()> {
///     let server = TestDrinksServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/drinks", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestDrinksServer {
    addr: SocketAddr,
    pool: SqlitePool,
    config: Config,
    jwks: MockJwksProvider,
    seeded: Drink,
    _handle: JoinHandle<()>,
}

impl TestDrinksServer {
    /// Spawn a server whose identity provider publishes the primary key.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn a server with extra configuration variables.
    ///
    /// The server will:
    /// - Use a fresh in-memory database seeded with a single drink
    /// - Fetch keys from a mock JWKS endpoint publishing the primary key
    /// - Bind to a random available port (127.0.0.1:0)
    ///
    /// `overrides` win over the harness defaults.
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let jwks = MockJwksProvider::start(&[&primary_signing_key()]).await;

        let mut vars = HashMap::from([
            ("AUTH0_DOMAIN".to_string(), TEST_DOMAIN.to_string()),
            ("API_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("JWKS_URL".to_string(), jwks.jwks_url()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("JWKS_MIN_REFRESH_INTERVAL_SECONDS".to_string(), "0".to_string()),
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let pool = repositories::connect(&config.database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open test database: {}", e))?;
        let seeded = DrinksRepository::reset_with_seed(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to seed test database: {}", e))?;

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: config.clone(),
        });

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            jwks,
            seeded,
            _handle: handle,
        })
    }

    /// Get reference to the database pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock identity provider.
    pub fn jwks(&self) -> &MockJwksProvider {
        &self.jwks
    }

    /// Drink seeded at startup.
    pub fn seeded_drink(&self) -> &Drink {
        &self.seeded
    }
}

impl Drop for TestDrinksServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestDrinksServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_seeds_database() -> Result<(), anyhow::Error> {
        let server = TestDrinksServer::spawn().await?;

        let drinks = DrinksRepository::list(server.pool()).await?;
        assert_eq!(drinks.len(), 1);
        assert_eq!(&drinks[0], server.seeded_drink());

        Ok(())
    }

    #[tokio::test]
    async fn test_servers_are_isolated() -> Result<(), anyhow::Error> {
        let server1 = TestDrinksServer::spawn().await?;
        let server2 = TestDrinksServer::spawn().await?;

        assert_ne!(server1.addr(), server2.addr());
        assert_ne!(server1.jwks().jwks_url(), server2.jwks().jwks_url());

        DrinksRepository::delete(server1.pool(), server1.seeded_drink().id).await?;
        assert!(DrinksRepository::list(server1.pool()).await?.is_empty());
        assert_eq!(DrinksRepository::list(server2.pool()).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_overrides_apply() -> Result<(), anyhow::Error> {
        let server = TestDrinksServer::spawn_with_vars(&[("JWT_CLOCK_SKEW_SECONDS", "45")]).await?;

        assert_eq!(server.config().jwt_clock_skew_seconds, 45);
        assert_eq!(server.config().api_audience, TEST_AUDIENCE);

        Ok(())
    }
}
