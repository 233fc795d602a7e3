//! HTTP routes for the Drinks Service.
//!
//! Defines the Axum router and application state.

use crate::auth::{
    JwksClient, JwksOptions, JwtValidator, KeySetProvider, RequiredPermission, ValidationSettings,
};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_permission, AuthState};
use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request timeout for all routes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: SqlitePool,

    /// Service configuration.
    pub config: Config,
}

/// Build the JWT validator from configuration.
pub fn jwt_validator_from_config(config: &Config) -> JwtValidator {
    let options = JwksOptions {
        cache_ttl: config.jwks_cache_ttl(),
        fetch_timeout: config.jwks_fetch_timeout(),
        min_refresh_interval: config.jwks_min_refresh_interval(),
        ..JwksOptions::default()
    };
    let key_sets: Arc<dyn KeySetProvider> =
        Arc::new(JwksClient::new(config.jwks_url.clone(), options));
    let settings = ValidationSettings::new(&config.auth_issuer, &config.api_audience)
        .with_leeway(config.jwt_leeway());

    JwtValidator::new(key_sets, settings)
}

/// Wrap `route` so it only runs for tokens granting `required`.
fn guarded(
    route: MethodRouter<Arc<AppState>>,
    auth: &AuthState,
    required: RequiredPermission,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn_with_state(
        auth.require(required),
        require_permission,
    ))
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/drinks` GET - Public menu
/// - `/drinks-detail` GET - Requires `get:drinks-detail`
/// - `/drinks` POST - Requires `post:drinks`
/// - `/drinks/:id` PATCH - Requires `patch:drinks`
/// - `/drinks/:id` DELETE - Requires `delete:drinks`
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (checks DB)
/// - `/metrics` - Prometheus metrics endpoint
/// - Fallback 404 for anything else
/// - Permissive CORS, TraceLayer, HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let jwt_validator = Arc::new(jwt_validator_from_config(&state.config));
    build_routes_with_validator(state, metrics_handle, jwt_validator)
}

/// Build the application routes around an existing validator.
pub fn build_routes_with_validator(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    jwt_validator: Arc<JwtValidator>,
) -> Router {
    let auth = AuthState::new(jwt_validator);

    // Operational endpoints
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Each method carries its own gate, so GET /drinks stays public while
    // POST on the same path is guarded.
    let drink_routes = Router::new()
        .route(
            "/drinks",
            get(handlers::list_drinks).merge(guarded(
                post(handlers::create_drink),
                &auth,
                RequiredPermission::POST_DRINKS,
            )),
        )
        .route(
            "/drinks-detail",
            guarded(
                get(handlers::list_drink_details),
                &auth,
                RequiredPermission::GET_DRINKS_DETAIL,
            ),
        )
        .route(
            "/drinks/:id",
            guarded(
                patch(handlers::update_drink),
                &auth,
                RequiredPermission::PATCH_DRINKS,
            )
            .merge(guarded(
                delete(handlers::delete_drink),
                &auth,
                RequiredPermission::DELETE_DRINKS,
            )),
        )
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE]);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights, add CORS headers
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(drink_routes)
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}
