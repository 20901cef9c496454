//! mailspend worker - polls an IMAP mailbox for receipt emails and pushes
//! the extracted bons to a Cospend project.
//!
//! Pass `--dry` to run a single cycle that logs the parsed bons without
//! publishing anything.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailspend::{runner, Config, Shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let dry = std::env::args().any(|arg| arg == "--dry");

    info!(dry = dry, "worker_starting");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        imap_host = %config.imap_host,
        imap_inbox = %config.imap_inbox,
        interval = config.interval,
        since = %config.since,
        "config_loaded"
    );

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    runner::run(config, shutdown, dry).await
}

/// Trigger the shutdown token on SIGINT/SIGTERM.
fn spawn_signal_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }

        shutdown.trigger();
    });
}
