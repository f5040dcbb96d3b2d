use std::sync::Arc;
use std::time::Duration;

use linewatch_collector::HttpTransport;
use linewatch_core::{CoreError, LineConfig};
use linewatch_events::SnapshotHub;
use linewatch_poller::{ConfigError, Poller, PollerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linewatch_api::app::build_app;
use linewatch_api::config::ServerConfig;
use linewatch_api::state::AppState;
use linewatch_api::ws;

/// Failures that abort startup before the server accepts connections.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("invalid environment: {0}")]
    Env(#[from] ConfigError),

    #[error("invalid line configuration: {0}")]
    LineConfig(#[from] CoreError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "linewatch_api=debug,linewatch_poller=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Startup failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    let poller_config = PollerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let line_config = LineConfig::load(&config.line_config_path)?;
    tracing::info!(
        path = %config.line_config_path.display(),
        line_id = %line_config.line_id,
        equipment = line_config.equipment.len(),
        processes = line_config.processes.len(),
        "Loaded line configuration"
    );

    // --- Poller ---
    let transport = Arc::new(HttpTransport::new(poller_config.fetch_timeout)?);
    let hub = Arc::new(SnapshotHub::new());
    let auto_start = poller_config.auto_start;
    let poller = Poller::new(line_config, transport, hub, poller_config);

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        poller: poller.clone(),
        ws_manager: Arc::clone(&ws_manager),
    };
    let app = build_app(state);

    if auto_start {
        poller.start().await;
    } else {
        tracing::info!("AUTO_START_POLLING disabled; waiting for POST /api/polling/start");
    }

    // --- Start server ---
    let addr = config.bind_addr();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if tokio::time::timeout(Duration::from_secs(5), poller.stop())
        .await
        .is_err()
    {
        tracing::warn!("Poller did not stop within 5s");
    }
    tracing::info!("Poller stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). If a handler cannot
/// be installed that branch never resolves and the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
