//! # Ben OS server
//!
//! Wires the versioned API from `benos-api` into a served axum application:
//! health routes, bearer-key authentication, per-client rate limiting,
//! security headers, CORS, request tracing, and panic recovery.

use axum::{
    http::{header, HeaderName, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use benos_api::{create_api_router, request_id_middleware, REQUEST_ID_HEADER};
use benos_core::API_PREFIX;
use benos_projects::DbState;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;


pub use config::{Config, ConfigError};
pub use error::AppError;

use crate::middleware::{
    agent_auth_middleware, auth_failure_guard, create_panic_handler, rate_limit_middleware,
    with_security_headers, AuthState, RateLimitLayer,
};

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "benos=info,tower_http=info";

/// Install the global tracing subscriber
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second install (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The full application: health routes, `/api/v1`, and the middleware stack
pub fn build_app(db: DbState, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.clone())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static("x-ratelimit-limit"),
            header::RETRY_AFTER,
        ]);

    let limiter = RateLimitLayer::new(config.rate_limit);

    let router = Router::new()
        .route("/api/health", get(api::health::health_check))
        .route("/api/status", get(api::health::status_check))
        .nest(API_PREFIX, create_api_router())
        // Innermost first: auth runs before the limiter so agents get their own bucket,
        // and the failure guard outside auth throttles clients that keep failing it
        .layer(from_fn_with_state(limiter.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(
            AuthState::new(db.clone(), config.dev_mode),
            agent_auth_middleware,
        ))
        .layer(from_fn_with_state(limiter, auth_failure_guard))
        .layer(create_panic_handler())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    with_security_headers(router)
        .layer(from_fn(request_id_middleware))
        .with_state(db)
}

/// Open the database, bind, and serve until ctrl-c
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let db = DbState::init_with_path(Some(config.db_path.clone())).await?;
    let app = build_app(db.clone(), &config);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        address = %addr,
        database = %config.db_path.display(),
        dev_mode = config.dev_mode,
        rate_limit_rpm = config.rate_limit.requests_per_minute,
        "Ben OS server listening"
    );
    if config.dev_mode {
        tracing::warn!("BENOS_DEV_MODE is on: API key authentication is disabled");
    }

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    db.flush_activity().await;
    served?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
