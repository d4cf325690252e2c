// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Assurly API Server
//!
//! Analyzes uploaded insurance policies with an AI service, ranks competitor
//! quotes by impact and sells access to the full comparison.

use assurly::{config::Config, db::MemoryDb, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Assurly API");

    let state = Arc::new(AppState::new(config.clone(), MemoryDb::new()));
    tracing::info!(
        ai = state.analyst.is_configured(),
        payments = state.stripe.is_configured(),
        email = state.mailer.is_configured(),
        "Integrations initialized"
    );

    if state.bootstrap_admin()? {
        tracing::info!("Bootstrap admin created");
    }

    spawn_cleanup_task(state.clone(), config.cleanup_interval_secs);

    // Build router
    let app = assurly::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically delete expired documents and analyses.
fn spawn_cleanup_task(state: Arc<AppState>, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::info!("Periodic cleanup disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let stats = state.db.cleanup_expired(chrono::Utc::now());
            tracing::info!(
                documents_deleted = stats.documents_deleted,
                analyses_deleted = stats.analyses_deleted,
                "Periodic cleanup completed"
            );
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("assurly=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
