//! Directory Cache - admin server over the query cache
//!
//! Serves cache statistics, manual invalidation and the cached business
//! hours lookups over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use directory_cache::api::{create_router, AppState};
use directory_cache::{spawn_sweeper_task, Config};

/// Main entry point for the directory cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the directory (cache, engine and domain queries)
/// 4. Start the background expiry sweeper
/// 5. Serve the admin router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "directory_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting directory cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, sweep_interval={}s, source_timeout={}ms, ttls(schedule={}s, hours={}s, memberships={}s, console={}s)",
        config.server_port,
        config.sweep_interval,
        config.source_timeout_ms,
        config.schedule_ttl,
        config.hours_ttl,
        config.membership_ttl,
        config.console_ttl
    );

    let state = AppState::from_config(&config);
    info!("Directory initialized");

    let sweeper_handle = if config.sweep_interval > 0 {
        let handle = spawn_sweeper_task(
            state.directory.cache.clone(),
            Duration::from_secs(config.sweep_interval),
        );
        info!("Background expiry sweeper started");
        Some(handle)
    } else {
        warn!("Expiry sweeper disabled; expired entries are only dropped on read");
        None
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweeper_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweeper.
async fn shutdown_signal(sweeper_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = sweeper_handle {
        handle.abort();
        warn!("Expiry sweeper aborted");
    }
}
