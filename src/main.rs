use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregator;
mod cache;
mod config;
mod error;
mod freshness;
mod github;
mod models;
mod render;
#[cfg(test)]
mod testutil;

use aggregator::CommitAggregator;
use cache::BannerCache;
use config::Config;
use error::{BannerError, ErrorResponse};
use github::GitHubClient;
use render::BannerRenderer;

#[derive(Clone)]
pub struct AppState {
    pub banner: Arc<BannerCache>,
    pub default_banner: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let state = on_startup(&config).await?;

    let app = app(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Banner service listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    on_shutdown(state);

    Ok(())
}

/// Builds the upstream client and snapshots the tracked repositories. Nothing
/// is served until this completes.
async fn on_startup(config: &Config) -> Result<AppState> {
    let client = GitHubClient::new(&config.api_url, &config.access_token, config.upstream_timeout)
        .context("Failed to build upstream client")?;

    let aggregator = CommitAggregator::init(Arc::new(client), &config.tracked_username)
        .await
        .context("Failed to load tracked repositories")?;

    let renderer = BannerRenderer::new(&config.assets_dir);
    let default_banner = renderer.default_banner_path();
    let banner = BannerCache::new(aggregator, Arc::new(renderer), config.refresh_window);

    tracing::info!(
        "Refreshing banner for {} at most every {} minutes",
        banner.aggregator().account().login,
        config.refresh_window.num_minutes()
    );

    Ok(AppState {
        banner: Arc::new(banner),
        default_banner,
    })
}

/// Drops the last handle on the upstream client, closing its connection pool.
fn on_shutdown(state: AppState) {
    let tracked = state.banner.aggregator().tracked_repos().count();
    drop(state);
    tracing::info!("Shut down, released client for {} repositories", tracked);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/banner", get(banner))
        .route("/github/banner", get(banner))
        .route("/default-banner", get(default_banner))
        .route("/github/default", get(default_banner))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn banner(State(state): State<AppState>) -> Result<impl IntoResponse, BannerError> {
    let png = state.banner.get_banner().await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    ))
}

async fn default_banner(State(state): State<AppState>) -> Response {
    match tokio::fs::read(&state.default_banner).await {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => {
            tracing::warn!("Default banner unavailable at {:?}: {}", state.default_banner, e);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::with_details("Default banner not found", e.to_string())),
            )
                .into_response()
        }
    }
}
