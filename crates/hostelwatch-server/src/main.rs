//! # hostelwatch-server
//!
//! HTTP backend for the hostelwatch geofence attendance system.
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package hostelwatch-server -- --config hostelwatch.toml
//!
//! # Production
//! HOSTELWATCH_SERVER__PRODUCTION=true ./hostelwatch-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hostelwatch_core::logging::{self, LogOutput};
use hostelwatch_core::{Config, Storage};
use hostelwatch_server::{api, state::AppState};
use tokio::net::TcpListener;
use tracing::info;

/// Geofence and attendance backend.
#[derive(Debug, Parser)]
#[command(name = "hostelwatch-server", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "hostelwatch.toml")]
    config: PathBuf,

    /// Listen address, overriding `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Use production logging regardless of `server.production`.
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    logging::init(&LogOutput::for_server(
        args.production || config.server.production,
    ))?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting hostelwatch-server");

    let addr = config.server.bind_addr()?;
    let storage = Storage::new(config.storage.data_dir());
    let state = AppState::new(config.server.clone(), storage).context("initializing state")?;
    info!(
        hostel_lat = state.hostel().latitude,
        hostel_lon = state.hostel().longitude,
        radius_m = config.server.alert_radius_meters,
        timezone = %config.server.timezone,
        "geofence_configured"
    );

    let app = api::create_router(Arc::new(state));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
