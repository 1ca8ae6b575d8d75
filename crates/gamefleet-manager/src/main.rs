// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gamefleet Manager - Game Server Control Plane
//!
//! An HTTP server responsible for:
//! - Restarting game server containers after a graceful world save
//! - Reporting container status, health and start time
//! - Telling deploy pipelines which artifacts are outdated
//! - Materializing uploaded builds, BYOND and rust-g archives

use std::sync::Arc;
use tracing::{info, warn};

use gamefleet_manager::config::Config;
use gamefleet_manager::filesystem::ShellFilesystem;
use gamefleet_manager::runner::{ContainerRunner, DockerRunner};
use gamefleet_manager::runtime::ManagerRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gamefleet_manager=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        servers_root = %config.layout.servers_root().display(),
        byond_root = %config.layout.byond_root().display(),
        rustg_root = %config.layout.rustg_root().display(),
        container_prefix = %config.container_prefix,
        "Starting Gamefleet Manager"
    );

    let runner = Arc::new(DockerRunner::from_config(&config));
    info!(runner_type = runner.runner_type(), "Runner initialized");

    let filesystem = Arc::new(ShellFilesystem::new(config.command_timeout));

    let runtime = ManagerRuntime::builder()
        .runner(runner)
        .filesystem(filesystem)
        .config(config)
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.local_addr(), "Manager ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("Gamefleet Manager shut down");

    Ok(())
}
