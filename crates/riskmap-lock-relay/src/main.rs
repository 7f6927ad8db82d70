//! WebSocket lock relay for riskmap collaborative editing.
//!
//! This server:
//! - Accepts WebSocket clients on /ws
//! - Records which user is editing which item (last writer wins)
//! - Fans lock, unlock and commit events out to the other clients
//! - Reclaims expired locks on a timer and reaps locks of dropped connections

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod connections;
mod error;
mod handlers;
mod hub;
mod sweeper;

use config::Config;
use handlers::{router, AppState};
use hub::{spawn_relay, RelayOptions};
use sweeper::Sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting riskmap-lock-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);
    info!("  Lock duration: {}ms", config.lock_duration_ms);
    info!("  Sweep interval: {}ms", config.sweep_interval_ms);
    if config.replay_locks_on_connect {
        info!("  Replaying active locks to new connections");
    }

    let (relay, relay_task) = spawn_relay(RelayOptions {
        lock_duration: config.lock_duration(),
        replay_locks_on_connect: config.replay_locks_on_connect,
    });
    let sweeper = Sweeper::start(relay.clone(), config.sweep_interval());

    let state = AppState {
        relay: relay.clone(),
    };

    let app = router(state);

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop().await;
    if let Err(e) = relay.shutdown() {
        warn!("Relay already stopped: {}", e);
    }
    relay_task.await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, initiating shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
        info!("Received SIGTERM, initiating shutdown");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
