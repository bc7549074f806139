mod config;
mod domain;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::services::backend::HttpBackend;
use crate::state::{AppState, SharedState};
use axum::{http::HeaderValue, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cached backend reads older than this are dropped by the hourly sweep.
const CACHE_MAX_AGE: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Using backend at {}", config.backend_api_url);
    let backend = HttpBackend::new(&config.backend_api_url, config.backend_timeout)?;

    let shared: SharedState = Arc::new(AppState::new(config.clone(), Arc::new(backend)));

    let scheduler = JobScheduler::new().await?;

    // Abandoned wizards and stale cache entries, every hour
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                let removed = state.sweep_wizard_sessions().await;
                if removed > 0 {
                    tracing::info!("Cleaned up {} idle wizard sessions", removed);
                }
                state.cache.cleanup(CACHE_MAX_AGE).await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: session cleanup hourly");

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    match &config.cors_origin {
        Some(origin) => {
            let origin: HeaderValue = origin.parse()?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => {
            tracing::warn!("CORS_ORIGIN not set, allowing any origin");
            Ok(CorsLayer::permissive())
        }
    }
}
