//! `PressGate` update gateway server.
//!
//! Serves the package-check and key-delivery protocol to remote WordPress
//! sites over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use pressgate_core::config::load_config;
use pressgate_core::tracing_init::init_tracing;
use pressgate_server::gateway::UpdateGateway;
use pressgate_server::http::{AppState, build_router};
use pressgate_server::storage::GatewayDatabase;

#[derive(Parser, Debug)]
#[command(name = "pressgate-server")]
#[command(version, about = "PressGate update gateway")]
struct Args {
    /// JSON config file (defaults to ~/.config/pressgate/config.json if present)
    #[arg(long, env = "PRESSGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Database file path, overriding the config file
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "PRESSGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.listen_addr = addr;
    }
    if let Some(path) = args.db_path {
        config.database_path = path;
    }

    let log_filter = format!(
        "pressgate_server={level},pressgate_core={level},tower_http={level}",
        level = config.log_level
    );
    init_tracing(&log_filter, args.log_json);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr,
        plugin_dir = %config.plugin_dir.display(),
        theme_dir = %config.theme_dir.display(),
        "Starting pressgate-server"
    );

    let db = GatewayDatabase::open(&config.database_path).await?;
    let gateway = UpdateGateway::from_config(db, &config);
    let app = build_router(AppState { gateway });

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Gateway ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C shutdown signal"),
        () = sigterm => info!("Received SIGTERM shutdown signal"),
    }
}
