//! Product catalog search gateway.
//!
//! Read-only HTTP gateway in front of a search engine cluster and a
//! relational catalog database. Exposes ranked product search and facet
//! aggregation; never writes to either backing store.
//!
//! # Middleware order (outermost first)
//!
//! Sentry request/transaction layers -> `TraceLayer` -> correlation id ->
//! rate limiting -> route handlers.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Router, ServiceExt, middleware as axum_middleware};
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use catalog_search_gateway::config::GatewayConfig;
use catalog_search_gateway::middleware::{correlation_id_middleware, rate_limit_middleware};
use catalog_search_gateway::state::AppState;
use catalog_search_gateway::{db, metrics as gateway_metrics, routes};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::from_env().expect("failed to load configuration");

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let _sentry_guard = config.sentry_dsn.clone().map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: dsn.parse().ok(),
            release: sentry::release_name!(),
            traces_sample_rate: 0.2,
            ..Default::default()
        })
    });

    let pool = db::create_pool(&config.database_url, config.timeouts.connect)
        .await
        .expect("failed to create database pool");
    tracing::info!("database pool created");

    let metrics_handle = gateway_metrics::install_recorder();

    let state = AppState::new(config.clone(), pool, metrics_handle)
        .await
        .expect("failed to initialize application state");

    let api_prefix = config.api_path_prefix();
    let request_timeout = config.timeouts.request;
    let app = Router::new()
        .nest(&api_prefix, routes::api_routes())
        .merge(routes::health_routes())
        .route("/metrics", get(metrics_endpoint))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state);

    // Trailing-slash normalization has to run before route matching, so it
    // wraps the whole service rather than being added via `Router::layer`.
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);

    let addr = config.socket_addr();
    tracing::info!(%addr, "catalog search gateway listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

/// Prometheus text-exposition endpoint, scraped independently of the
/// health probes (spec's ambient observability stack).
async fn metrics_endpoint(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    (StatusCode::OK, state.metrics().render())
}

/// Wait for Ctrl+C or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
