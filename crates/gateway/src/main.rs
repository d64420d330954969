//! DocChat API Gateway
//!
//! The single HTTP entry point.
//! Handles:
//! - Authentication and account management
//! - Collections, document ingestion and chat
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod state;


pub use state::AppState;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use docchat_common::{config::AppConfig, db::DbPool, metrics, telemetry};
use middleware::rate_limit::{rate_limit_middleware, RateLimitState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    let telemetry = telemetry::init_tracing(&config.observability)?;

    info!("Starting DocChat API Gateway v{}", docchat_common::VERSION);

    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        metrics::install_exporter(config.observability.metrics_port)?;
    }

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        db.migrate().await?;
    }

    let state = AppState::new(config.clone(), db)?;
    info!(
        vector_store = state.vectors.provider(),
        embedding = %config.embedding.provider,
        "Application state ready"
    );

    let app = create_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host: {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }

    info!("Server shutdown complete");
    telemetry.shutdown();
    served.map_err(Into::into)
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        // Account endpoints
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/signin", post(handlers::auth::signin))
        .route(
            "/auth/me",
            get(handlers::auth::me).patch(handlers::auth::update_me),
        )
        .route("/auth/change-password", post(handlers::auth::change_password))
        .route(
            "/auth/llm-preferences",
            get(handlers::auth::get_llm_preferences).post(handlers::auth::save_llm_preferences),
        )
        .route(
            "/auth/password-strength",
            post(handlers::auth::check_password_strength),
        )
        // Settings
        .route(
            "/settings",
            get(handlers::settings::list_settings).post(handlers::settings::save_settings),
        )
        // Provider catalog
        .route("/llm/providers", get(handlers::llm::list_providers))
        // Collections
        .route(
            "/collections",
            get(handlers::collections::list_collections)
                .post(handlers::collections::create_collection),
        )
        .route(
            "/collections/{id}",
            get(handlers::collections::get_collection)
                .delete(handlers::collections::delete_collection),
        )
        // Documents
        .route(
            "/collections/{id}/documents",
            post(handlers::documents::upload_document),
        )
        .route(
            "/collections/{id}/documents/{doc_id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
        // Chat
        .route("/collections/{id}/chat", post(handlers::chat::chat))
        .route_layer(axum::middleware::from_fn(
            middleware::metrics::track_metrics,
        ));

    if config.rate_limit.enabled {
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            RateLimitState::new(&config.rate_limit),
            rate_limit_middleware,
        ));
    }

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
