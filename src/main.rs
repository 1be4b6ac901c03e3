mod analytics;
mod config;
mod db;
mod domain;
mod events;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, ANON_RATE_WINDOW_SECS};
use crate::events::ChangeFeed;
use crate::middleware::RateLimiter;
use crate::services::classifier::{AnalysisBackend, OpenAiBackend, SentimentClassifier};
use crate::services::pipeline::FeedbackPipeline;
use crate::state::SharedState;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", config);
    if config.trust_proxy {
        tracing::info!("TRUST_PROXY set, guests are identified by X-Forwarded-For");
    }

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let backend: Option<Arc<dyn AnalysisBackend>> = match &config.openai_api_key {
        Some(key) => {
            tracing::info!("Remote classification enabled (model {})", config.openai_model);
            Some(Arc::new(OpenAiBackend::new(
                key.clone(),
                config.openai_model.clone(),
            )))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not configured, feedback will be classified locally");
            None
        }
    };
    let classifier = SentimentClassifier::new(backend, config.classifier_timeout);

    let shared: SharedState = Arc::new(state::AppState {
        pool,
        pipeline: Arc::new(FeedbackPipeline::new(classifier)),
        feed: ChangeFeed::new(),
        session_key: config.session_key.clone(),
        anon_limiter: RateLimiter::new(config.anon_rate_limit, ANON_RATE_WINDOW_SECS),
        trust_proxy: config.trust_proxy,
    });

    let scheduler = JobScheduler::new().await?;

    // Rate limiter cleanup - hourly
    let limiter = shared.anon_limiter.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let limiter = limiter.clone();
            Box::pin(async move {
                let active = limiter.cleanup().await;
                tracing::info!("Rate limiter pruned, {} active identifiers", active);
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: rate limiter cleanup hourly");

    let app = web::routes(shared.clone()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
