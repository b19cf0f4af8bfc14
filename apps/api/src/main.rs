mod config;
mod credentials;
mod db;
mod errors;
mod llm_client;
mod models;
mod refinement;
mod render;
mod resume;
mod routes;
mod settings;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::credentials::CredentialCipher;
use crate::db::create_pool;
use crate::llm_client::HttpModelFactory;
use crate::refinement::RefinementContext;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Refine API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Credential cipher for stored API keys
    let cipher = CredentialCipher::new(&config.encryption_key)
        .context("ENCRYPTION_KEY must be a url-safe base64 Fernet key")?;

    // LLM client factory: per-request clients built from each user's settings
    let models = HttpModelFactory::new(config.provider_defaults());
    info!(
        "LLM client factory initialized (default endpoint: {})",
        config.openai_base_url
    );

    let refinement = RefinementContext {
        models: Arc::new(models),
        cipher: Arc::new(cipher),
        max_concurrency: config.refine_max_concurrency.max(1),
        poll_interval: config.sse_poll_interval,
    };
    info!(
        "Experience refinement: max concurrency {}, poll interval {:?}",
        refinement.max_concurrency, refinement.poll_interval
    );

    let state = AppState { db, refinement };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
