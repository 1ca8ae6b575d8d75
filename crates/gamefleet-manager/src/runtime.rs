// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for gamefleet-manager.
//!
//! [`ManagerRuntime`] runs the HTTP control plane inside an existing tokio
//! application instead of as a standalone binary.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gamefleet_manager::config::Config;
//! use gamefleet_manager::filesystem::ShellFilesystem;
//! use gamefleet_manager::runner::DockerRunner;
//! use gamefleet_manager::runtime::ManagerRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let runtime = ManagerRuntime::builder()
//!         .runner(Arc::new(DockerRunner::from_config(&config)))
//!         .filesystem(Arc::new(ShellFilesystem::new(config.command_timeout)))
//!         .config(config)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::filesystem::HostFilesystem;
use crate::handlers::ManagerState;
use crate::runner::ContainerRunner;

/// Builder for creating a [`ManagerRuntime`].
#[derive(Default)]
pub struct ManagerRuntimeBuilder {
    config: Option<Config>,
    runner: Option<Arc<dyn ContainerRunner>>,
    filesystem: Option<Arc<dyn HostFilesystem>>,
    bind_addr: Option<SocketAddr>,
}

impl ManagerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    ///
    /// Default: [`Config::default()`]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the container runner (required).
    pub fn runner(mut self, runner: Arc<dyn ContainerRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Set the host filesystem used for uploads (required).
    pub fn filesystem(mut self, filesystem: Arc<dyn HostFilesystem>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    /// Override the HTTP bind address from the configuration.
    ///
    /// Port 0 picks a free port; see [`ManagerRuntime::local_addr`].
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<ManagerRuntimeConfig> {
        let runner = self
            .runner
            .ok_or_else(|| anyhow::anyhow!("runner is required"))?;
        let filesystem = self
            .filesystem
            .ok_or_else(|| anyhow::anyhow!("filesystem is required"))?;
        let mut config = self.config.unwrap_or_default();
        if let Some(addr) = self.bind_addr {
            config.http_addr = addr;
        }

        Ok(ManagerRuntimeConfig {
            config,
            runner,
            filesystem,
        })
    }
}

/// Configuration for a [`ManagerRuntime`].
pub struct ManagerRuntimeConfig {
    config: Config,
    runner: Arc<dyn ContainerRunner>,
    filesystem: Arc<dyn HostFilesystem>,
}

impl ManagerRuntimeConfig {
    /// Bind the listener and start serving.
    pub async fn start(self) -> Result<ManagerRuntime> {
        let state = Arc::new(ManagerState::new(
            &self.config,
            self.runner.clone(),
            self.filesystem.clone(),
        ));

        let listener = TcpListener::bind(self.config.http_addr).await?;
        let local_addr = listener.local_addr()?;
        let router = crate::server::router(state.clone(), self.config.max_upload_bytes);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server_handle = tokio::spawn(async move {
            crate::server::serve(listener, router, async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(anyhow::Error::from)
        });

        info!(
            addr = %local_addr,
            runner_type = self.runner.runner_type(),
            servers_root = %self.config.layout.servers_root().display(),
            "ManagerRuntime started"
        );

        Ok(ManagerRuntime {
            server_handle,
            shutdown_tx,
            state,
            local_addr,
        })
    }
}

/// A running manager.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination. Restarts still
/// in flight keep running on the tokio runtime.
pub struct ManagerRuntime {
    server_handle: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
    state: Arc<ManagerState>,
    local_addr: SocketAddr,
}

impl ManagerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ManagerRuntimeBuilder {
        ManagerRuntimeBuilder::new()
    }

    /// Address the HTTP server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a reference to the shared handler state.
    pub fn state(&self) -> &Arc<ManagerState> {
        &self.state
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }

    /// Gracefully shut down the HTTP server and wait for it to stop.
    pub async fn shutdown(self) -> Result<()> {
        info!("ManagerRuntime shutting down...");

        let _ = self.shutdown_tx.send(true);

        match self.server_handle.await {
            Ok(Ok(())) => {
                info!("ManagerRuntime shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("ManagerRuntime server error during shutdown: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("ManagerRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        }
    }
}
