//! `serve` command

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::aggregator::AggregatorClient;
use crate::api::{create_router, AppState};
use crate::config::{EnvelopePaths, ServeArgs, ServerConfig};
use crate::error::EnvelopeResult;
use crate::storage::{initialize_storage, Storage};

/// Load settings and storage, then serve the API until interrupted
pub async fn handle_serve(args: ServeArgs) -> EnvelopeResult<()> {
    let config = ServerConfig::try_from(&args)?;
    let paths = EnvelopePaths::resolve(config.data_dir.as_deref())?;
    let settings = initialize_storage(&paths)?;

    info!(
        listen = %config.listen_addr,
        data_dir = %paths.base_dir().display(),
        aggregator = ?config.aggregator,
        "Starting envelope server"
    );

    let storage = Storage::open(paths)?;
    let aggregator = AggregatorClient::from_config(&config)?;
    let state = AppState::new(storage, settings, &config.secret, aggregator)?;
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
