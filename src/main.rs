// SPDX-License-Identifier: EUPL-1.2

//! Client certificate registry server.

use client_cert_registry::{router, AppState, Config};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "client_cert_registry=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::from_config(&config)?);

    tracing::info!("Certificate repository: {}", config.cert_repo);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Client certificate registry listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
