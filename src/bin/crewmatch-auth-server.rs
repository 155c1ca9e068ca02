// ABOUTME: Main binary for the Crewmatch authentication server
// ABOUTME: Wires configuration, storage, and routes, then serves HTTP until shutdown
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Crewmatch

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use crewmatch_auth::config::environment::ServerConfig;
use crewmatch_auth::context::ServerResources;
use crewmatch_auth::database::Database;
use crewmatch_auth::logging;
use crewmatch_auth::notifications::create_notifier;
use crewmatch_auth::routes::router;
use crewmatch_auth::store::factory::create_store;
use crewmatch_auth::store::StoreConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "crewmatch-auth-server",
    about = "Crewmatch authentication and session server",
    version
)]
struct Args {
    /// HTTP port override (default from HTTP_PORT or 8080)
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env().context("Failed to initialize logging")?;

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    info!("Configuration: {}", config.summary());

    let database = Database::new(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let store_config = StoreConfig {
        redis_url: config.store.redis_url.clone(),
        redis_connection: config.store.redis_connection.clone(),
        ..StoreConfig::default()
    };
    let store = create_store(config.store.backend, &store_config)
        .await
        .context("Failed to initialize secret store")?;

    let notifier = create_notifier(&config.notifier);

    let port = config.http_port;
    let resources = Arc::new(ServerResources::new(config, database, store, notifier));
    let app = router(resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received");
}
