#![forbid(unsafe_code)]

use clap::Parser;
use quota_gateway_lib::{config::load_from_path, tcp, telemetry, ConnectionCount};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rate limited TCP gateway relaying to a fixed upstream list")]
struct Cli {
    /// Port to listen on (loopback only)
    #[arg(short, long, env = "QUOTA_GATEWAY_PORT", default_value_t = 8005)]
    port: u16,

    /// Path to configuration YAML file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Logging is configured from the file, so this one goes to stderr
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) = telemetry::init_tracing(&cfg.logging) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    info!(
        port = cli.port,
        config = %cli.config.display(),
        upstreams = cfg.upstreams.len(),
        "starting rate limiter service"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let counters = Arc::new(ConnectionCount::default());
    if let Err(err) = tcp::run(Arc::new(cfg), cli.port, counters, shutdown_rx).await {
        error!(%err, "gateway exited with error");
        std::process::exit(1);
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = ctrl_c() => info!("Received SIGINT, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c().await;
                info!("Received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Received SIGINT, shutting down");
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to install SIGINT handler");
        std::future::pending::<()>().await;
    }
}
