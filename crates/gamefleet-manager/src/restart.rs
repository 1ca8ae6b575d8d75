// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Restart supervision.
//!
//! Each instance is either idle or restarting:
//!
//! ```text
//!            restart() admitted
//!     ┌──────┐ ───────────────▶ ┌────────────┐
//!     │ IDLE │                  │ RESTARTING │  signal save, then docker restart
//!     └──────┘ ◀─────────────── └────────────┘
//!            tail task finished (ok, error or panic)
//! ```
//!
//! Admission checks, in order: not already restarting, managed by the runner,
//! health is not `starting`. Checks and the registry insert happen under one
//! admission lock, so two concurrent requests for the same instance can never
//! both be admitted. The restart itself runs in a detached task that owns a
//! `RestartGuard`; dropping the guard is what returns the instance to idle.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::layout::validate_component;
use crate::runner::{ContainerRunner, HEALTH_STARTING, RunnerError};

/// Set of instances with a restart in flight.
#[derive(Debug, Default)]
pub struct RestartRegistry {
    restarting: Mutex<HashSet<String>>,
}

impl RestartRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a restart of `instance` is in flight.
    pub fn is_restarting(&self, instance: &str) -> bool {
        self.restarting.lock().contains(instance)
    }

    /// Instances currently restarting, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.restarting.lock().iter().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, instance: &str) -> bool {
        self.restarting.lock().insert(instance.to_string())
    }

    fn remove(&self, instance: &str) {
        self.restarting.lock().remove(instance);
    }
}

/// Removes its instance from the registry when dropped.
struct RestartGuard {
    registry: Arc<RestartRegistry>,
    instance: String,
}

impl Drop for RestartGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.instance);
    }
}

/// Handle to an admitted restart.
///
/// Dropping the handle detaches the restart; it still runs to completion.
#[derive(Debug)]
pub struct RestartHandle {
    instance: String,
    task: JoinHandle<std::result::Result<(), RunnerError>>,
}

impl RestartHandle {
    /// Instance being restarted.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Whether the restart has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the restart to finish and return its outcome.
    pub async fn wait(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result.map_err(Error::from),
            Err(e) => Err(Error::Runner(RunnerError::Other(format!(
                "restart task for {} aborted: {}",
                self.instance, e
            )))),
        }
    }
}

/// Admits and drives instance restarts.
pub struct RestartSupervisor {
    runner: Arc<dyn ContainerRunner>,
    registry: Arc<RestartRegistry>,
    admission: tokio::sync::Mutex<()>,
}

impl RestartSupervisor {
    /// Create a supervisor with an empty registry.
    pub fn new(runner: Arc<dyn ContainerRunner>) -> Self {
        Self {
            runner,
            registry: Arc::new(RestartRegistry::new()),
            admission: tokio::sync::Mutex::new(()),
        }
    }

    /// The registry of in-flight restarts.
    pub fn registry(&self) -> Arc<RestartRegistry> {
        self.registry.clone()
    }

    /// Whether a restart of `instance` is in flight.
    pub fn is_restarting(&self, instance: &str) -> bool {
        self.registry.is_restarting(instance)
    }

    /// Start a restart of `instance`.
    ///
    /// Returns as soon as the restart is admitted; the save signal and the
    /// container restart run in the background.
    pub async fn restart(&self, instance: &str) -> Result<RestartHandle> {
        validate_component("instance name", instance)?;

        let admission = self.admission.lock().await;

        if self.registry.is_restarting(instance) {
            return Err(Error::AlreadyRestarting(instance.to_string()));
        }

        let managed = self.runner.list_managed_instances().await?;
        if !managed.iter().any(|name| name == instance) {
            return Err(Error::InstanceNotFound(instance.to_string()));
        }

        let health = self.runner.state_health(instance).await?;
        if health == HEALTH_STARTING {
            return Err(Error::CurrentlyStarting(instance.to_string()));
        }

        if !self.registry.insert(instance) {
            return Err(Error::AlreadyRestarting(instance.to_string()));
        }
        let guard = RestartGuard {
            registry: self.registry.clone(),
            instance: instance.to_string(),
        };
        drop(admission);

        info!(instance = %instance, "Restart admitted");

        let runner = self.runner.clone();
        let name = instance.to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = signal_then_restart(runner.as_ref(), &name).await;
            match &result {
                Ok(()) => info!(instance = %name, "Restart completed"),
                Err(e) => error!(instance = %name, error = %e, "Restart failed"),
            }
            result
        });

        Ok(RestartHandle {
            instance: instance.to_string(),
            task,
        })
    }
}

async fn signal_then_restart(
    runner: &dyn ContainerRunner,
    instance: &str,
) -> std::result::Result<(), RunnerError> {
    if let Err(e) = runner.signal_graceful_save(instance).await {
        warn!(instance = %instance, error = %e, "Graceful save signal failed, not restarting");
        return Err(e);
    }
    runner.restart_instance(instance).await
}
