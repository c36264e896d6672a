pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod overrides;
pub mod rate_limit;
pub mod store;

use crate::auth::JwtValidator;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::overrides::{OverrideRepository, OverrideService, RedisOverrideRepository};
use crate::rate_limit::{
    rate_limit_middleware, AdmissionEngine, QuotaResolver, RateLimitOptions, RateLimitState,
};
use crate::store::{RedisWindowStore, WindowStore};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Everything the HTTP app needs, constructed explicitly so tests can
/// inject in-memory doubles for the store, the repository, and the
/// clock.
pub struct AppDeps {
    pub window_store: Arc<dyn WindowStore>,
    pub override_repository: Arc<dyn OverrideRepository>,
    pub clock: Arc<dyn Clock>,
    pub jwt: Option<Arc<JwtValidator>>,
    pub rate_limit: RateLimitOptions,
}

/// Build the HTTP application: admin routes and the health probe, all
/// behind the rate limiting layer.
pub fn build_router(deps: AppDeps) -> Router {
    let overrides = Arc::new(OverrideService::new(deps.override_repository));

    let state = RateLimitState {
        engine: Arc::new(AdmissionEngine::new(
            deps.window_store.clone(),
            deps.clock,
            deps.rate_limit.strategy,
        )),
        quotas: Arc::new(QuotaResolver::new(
            deps.rate_limit.clone(),
            overrides.clone(),
        )),
        identity: Arc::new(IdentityResolver::new(deps.jwt)),
        key_prefix: deps.rate_limit.key_prefix.clone(),
        global: deps.rate_limit.global,
    };

    Router::new()
        .nest("/admin/rate-limits", admin::router(overrides))
        .merge(health::router(deps.window_store))
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Initialize the quotagate server
pub async fn init_server(config: AppConfig) -> Result<()> {
    config.validate()?;

    info!("Starting quotagate");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );

    let client = redis::Client::open(config.redis.url.as_str())?;
    let connection = redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to store at {}", config.redis.url);

    let jwt = match &config.auth {
        Some(jwt_config) => Some(Arc::new(JwtValidator::new(jwt_config)?)),
        None => None,
    };

    let deps = AppDeps {
        window_store: Arc::new(RedisWindowStore::new(connection.clone())),
        override_repository: Arc::new(RedisOverrideRepository::new(
            connection,
            format!("{}:overrides", config.rate_limit.key_prefix),
        )),
        clock: Arc::new(SystemClock),
        jwt,
        rate_limit: config.rate_limit.clone(),
    };

    let app = build_router(deps);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Quotagate ready to accept connections");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| crate::error::QuotagateError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quotagate=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
