// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instance status aggregation.
//!
//! Merges what the container runtime reports about an instance with the
//! restart registry. The `restarting` flag never costs a runtime call.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::restart::RestartRegistry;
use crate::runner::ContainerRunner;

/// Status of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// A restart is in flight.
    pub restarting: bool,
    /// Container state (`running`, `exited`, ...).
    pub status: String,
    /// Container health (`starting`, `healthy`, ...), empty without a health check.
    pub health: String,
    /// Last container start time as reported by the runtime.
    pub started_at: String,
}

/// Answers status queries for single instances and the whole fleet.
pub struct StatusAggregator {
    runner: Arc<dyn ContainerRunner>,
    registry: Arc<RestartRegistry>,
}

impl StatusAggregator {
    /// Create an aggregator reading restart flags from `registry`.
    pub fn new(runner: Arc<dyn ContainerRunner>, registry: Arc<RestartRegistry>) -> Self {
        Self { runner, registry }
    }

    /// Status of one managed instance.
    pub async fn status_of(&self, instance: &str) -> Result<InstanceStatus> {
        let managed = self.runner.list_managed_instances().await?;
        if !managed.iter().any(|name| name == instance) {
            return Err(Error::InstanceNotFound(instance.to_string()));
        }
        self.query(instance).await
    }

    /// Status of every managed instance, keyed by name.
    ///
    /// The managed set is listed once and that snapshot is used for the
    /// whole batch.
    pub async fn status_of_all(&self) -> Result<BTreeMap<String, InstanceStatus>> {
        let managed = self.runner.list_managed_instances().await?;
        let statuses = try_join_all(managed.iter().map(|name| self.query(name))).await?;
        Ok(managed.into_iter().zip(statuses).collect())
    }

    async fn query(&self, instance: &str) -> Result<InstanceStatus> {
        let (status, health, started_at) = tokio::try_join!(
            self.runner.state_status(instance),
            self.runner.state_health(instance),
            self.runner.state_started_at(instance),
        )?;
        Ok(InstanceStatus {
            restarting: self.registry.is_restarting(instance),
            status,
            health,
            started_at,
        })
    }
}
