use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backoffice_shield::{application::builder::ApplicationBuilder, create_router, Config};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    init_tracing(config.log_json);

    info!("Starting backoffice shield");
    config.validate()?;
    info!(environment = ?config.environment, "Configuration loaded and validated");

    let listen_addr = config.listen_addr.clone();
    let app = ApplicationBuilder::new(config)
        .with_database()
        .await?
        .build();

    let sweeper = app.sweeper.clone().spawn();

    // Business routes are mounted by the embedding service; the standalone
    // binary serves only the pipeline's own endpoints.
    let router = create_router(&app.state, Router::new())?;

    info!("Listening on {}", listen_addr);
    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}
