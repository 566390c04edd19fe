//! Charity fund service entry point.
//!
//! Administrators register fundraising projects; users donate. Every new
//! project or donation is matched against the open entries on the other side
//! (oldest first) so money flows to projects as soon as it is available.
//! State lives in SQLite and is exposed through a small Axum REST API.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod investment;
#[cfg(test)]
mod invariants;
mod models;
mod sheets;

use std::sync::Arc;

use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    if let Some((email, token)) = config.superuser() {
        let admin = db::ensure_superuser(&pool, email, token).await?;
        info!("Superuser #{} ({}) ready", admin.id, admin.email);
    }

    // Outbound client for the report export.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let api_state = Arc::new(api::ApiState {
        pool,
        client,
        config: config.clone(),
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
