//! HTTP surface for the image scoring service.
//!
//! - `POST /api/score-image`: multipart `image` file and `prompt` text
//! - `GET /api/score-image`, `GET /health`: service descriptor

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::get;
use imgscore_scoring::{ScoringObserver, build_scorer};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{AppConfig, LogFormat, ServerConfig};
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Router with every route and the middleware stack applied.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route(
            "/api/score-image",
            get(routes::describe).post(routes::score_image),
        )
        .route("/health", get(routes::describe))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,imgscore_scoring=info,tower_http=info")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(err) = result {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

/// Build the scorer from `config` and serve until ctrl-c or SIGTERM.
pub async fn run(
    config: AppConfig,
    observer: Option<Arc<dyn ScoringObserver>>,
) -> anyhow::Result<()> {
    config.validate()?;
    let scorer = build_scorer(config.scoring.clone(), observer)?;
    let state = AppState::new(scorer);
    let app = build_router(state, &config.server);

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Image scoring server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
