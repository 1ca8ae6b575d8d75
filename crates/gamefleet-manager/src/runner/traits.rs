// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner trait definitions.
//!
//! Defines the abstract interface to the container runtime hosting the
//! game-server instances.

use async_trait::async_trait;
use thiserror::Error;

use crate::command::CommandError;

/// Health reported by a container that is still booting.
pub const HEALTH_STARTING: &str = "starting";

/// Errors from runner operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The runtime CLI failed or timed out.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Trait for container runtimes.
///
/// Instances are addressed by their bare name; mapping a name to a
/// container is the runner's business. Runners hold no state of their own
/// about restarts, that is tracked by the restart supervisor.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Runner type identifier (e.g., "docker", "mock")
    fn runner_type(&self) -> &'static str;

    /// Names of all instances this runner manages.
    async fn list_managed_instances(&self) -> Result<Vec<String>>;

    /// Container state, e.g. `running` or `exited`.
    async fn state_status(&self, instance: &str) -> Result<String>;

    /// Container health, e.g. `starting`, `healthy`, `unhealthy`.
    ///
    /// Empty when the container defines no health check.
    async fn state_health(&self, instance: &str) -> Result<String>;

    /// When the container was last started, as reported by the runtime.
    async fn state_started_at(&self, instance: &str) -> Result<String>;

    /// Ask the game process inside the container to save its state.
    async fn signal_graceful_save(&self, instance: &str) -> Result<()>;

    /// Restart the instance's container.
    async fn restart_instance(&self, instance: &str) -> Result<()>;
}
