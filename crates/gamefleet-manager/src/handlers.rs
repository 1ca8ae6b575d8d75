// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request handlers.
//!
//! Transport-independent operations behind the HTTP routes. Each handler takes
//! the shared [`ManagerState`] and returns domain values; status codes and
//! JSON shapes are decided in [`crate::server`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filesystem::{ArchiveFormat, HostFilesystem};
use crate::layout::{Layout, instance_exists, validate_component};
use crate::restart::{RestartHandle, RestartSupervisor};
use crate::runner::ContainerRunner;
use crate::staleness::{Outdated, ProposedArtifacts, StalenessEvaluator};
use crate::status::{InstanceStatus, StatusAggregator};
use crate::upload::{ArtifactTarget, UploadPipeline};

/// Message returned when a build check or upload names an unknown instance.
pub const SERVER_DOES_NOT_EXIST: &str = "Server does not exist";

/// Shared state for all handlers.
pub struct ManagerState {
    /// Filesystem roots.
    pub layout: Layout,
    /// Runtime collaborator.
    pub runner: Arc<dyn ContainerRunner>,
    /// Restart admission and registry.
    pub supervisor: RestartSupervisor,
    /// Status queries.
    pub aggregator: StatusAggregator,
    /// Staleness checks.
    pub evaluator: StalenessEvaluator,
    /// Upload materialization.
    pub pipeline: UploadPipeline,
    /// When the manager started (for uptime calculation).
    pub start_time: Instant,
    /// Manager version string.
    pub version: String,
}

impl ManagerState {
    /// Wire up all components from `config`.
    pub fn new(
        config: &Config,
        runner: Arc<dyn ContainerRunner>,
        fs: Arc<dyn HostFilesystem>,
    ) -> Self {
        let supervisor = RestartSupervisor::new(runner.clone());
        let aggregator = StatusAggregator::new(runner.clone(), supervisor.registry());
        let evaluator = StalenessEvaluator::new(config.layout.clone());
        let pipeline = UploadPipeline::new(
            config.layout.clone(),
            config.ownership.clone(),
            config.staging_dir.clone(),
            fs,
        );

        Self {
            layout: config.layout.clone(),
            runner,
            supervisor,
            aggregator,
            evaluator,
            pipeline,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Milliseconds since the manager started.
    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Always true while the process serves requests.
    pub healthy: bool,
    /// Manager version.
    pub version: String,
    /// Container runtime backend (`docker`, `mock`).
    pub runner: String,
    /// Uptime in milliseconds.
    pub uptime_ms: u64,
}

/// Handle a health check.
pub fn handle_health_check(state: &ManagerState) -> HealthCheckResponse {
    HealthCheckResponse {
        healthy: true,
        version: state.version.clone(),
        runner: state.runner.runner_type().to_string(),
        uptime_ms: state.uptime_ms(),
    }
}

// ============================================================================
// Status & Restart
// ============================================================================

/// Status of one instance, or of every managed instance when `instance` is `None`.
pub async fn handle_status(
    state: &ManagerState,
    instance: Option<&str>,
) -> Result<BTreeMap<String, InstanceStatus>> {
    match instance {
        Some(name) => {
            let status = state.aggregator.status_of(name).await?;
            Ok(BTreeMap::from([(name.to_string(), status)]))
        }
        None => state.aggregator.status_of_all().await,
    }
}

/// Admit a restart. The restart continues in the background.
pub async fn handle_restart(state: &ManagerState, instance: &str) -> Result<RestartHandle> {
    state.supervisor.restart(instance).await
}

// ============================================================================
// Build check
// ============================================================================

/// Build check parameters.
#[derive(Debug, Clone)]
pub struct BuildCheckRequest {
    /// Instance to check.
    pub instance: String,
    /// Offered versions.
    pub proposed: ProposedArtifacts,
}

/// Build check response.
#[derive(Debug, Clone, Serialize)]
pub struct BuildCheckResponse {
    /// Artifacts that need uploading.
    pub outdated: Outdated,
}

/// Decide which artifacts an instance needs.
pub async fn handle_build_check(
    state: &ManagerState,
    request: &BuildCheckRequest,
) -> Result<BuildCheckResponse> {
    ensure_instance_exists(state, &request.instance).await?;
    let outdated = state
        .evaluator
        .evaluate(&request.instance, &request.proposed)
        .await?;
    Ok(BuildCheckResponse { outdated })
}

// ============================================================================
// Upload
// ============================================================================

/// What happened to one upload part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOutcome {
    /// The part was extracted to its destination.
    Materialized(ArtifactTarget),
    /// The part was ignored (unknown name or unsupported content type).
    Skipped(String),
}

/// Check that an upload may proceed for `instance`.
pub async fn handle_upload_start(state: &ManagerState, instance: &str) -> Result<()> {
    ensure_instance_exists(state, instance).await
}

/// Materialize one upload part.
///
/// Parts with an unknown name or an unsupported content type are skipped
/// without reading them.
pub async fn handle_upload_part<R>(
    state: &ManagerState,
    instance: &str,
    part_name: &str,
    content_type: Option<&str>,
    reader: &mut R,
) -> Result<PartOutcome>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let Ok(target) = part_name.parse::<ArtifactTarget>() else {
        debug!(instance = %instance, part = %part_name, "Skipping unknown upload part");
        return Ok(PartOutcome::Skipped(part_name.to_string()));
    };

    let format = ArchiveFormat::from_content_type(content_type);
    if !format.is_supported() {
        info!(
            instance = %instance,
            target = %target,
            content_type = ?content_type,
            "Skipping upload part with unsupported content type"
        );
        return Ok(PartOutcome::Skipped(part_name.to_string()));
    }

    state
        .pipeline
        .materialize(target, instance, format, reader)
        .await?;
    Ok(PartOutcome::Materialized(target))
}

async fn ensure_instance_exists(state: &ManagerState, instance: &str) -> Result<()> {
    validate_component("instance name", instance)?;
    if instance_exists(&state.layout, instance).await {
        Ok(())
    } else {
        Err(Error::InvalidRequest(SERVER_DOES_NOT_EXIST.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::ShellFilesystem;
    use crate::runner::MockRunner;
    use tempfile::TempDir;

    fn state(temp_dir: &TempDir) -> ManagerState {
        let root = temp_dir.path();
        let config = Config {
            layout: Layout::new(root.join("servers"), root.join("byond"), root.join("rust-g")),
            staging_dir: root.join("staging"),
            ..Config::default()
        };
        ManagerState::new(
            &config,
            Arc::new(MockRunner::new()),
            Arc::new(ShellFilesystem::default()),
        )
    }

    #[test]
    fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let response = handle_health_check(&state(&temp_dir));
        assert!(response.healthy);
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.runner, "mock");
    }

    #[tokio::test]
    async fn test_build_check_unknown_instance() {
        let temp_dir = TempDir::new().unwrap();
        let request = BuildCheckRequest {
            instance: "ghost".to_string(),
            proposed: ProposedArtifacts {
                build_stamp: 1,
                byond: "515.1647".to_string(),
                rustg: "3.4.0".to_string(),
            },
        };
        let err = handle_build_check(&state(&temp_dir), &request)
            .await
            .unwrap_err();
        match err {
            Error::InvalidRequest(message) => assert_eq!(message, SERVER_DOES_NOT_EXIST),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_and_unsupported_parts_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let state = state(&temp_dir);
        let mut reader: &[u8] = b"payload";

        let outcome = handle_upload_part(&state, "alpha", "config", Some("application/gzip"), &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, PartOutcome::Skipped("config".to_string()));

        let outcome = handle_upload_part(&state, "alpha", "byond", Some("application/zip"), &mut reader)
            .await
            .unwrap();
        assert_eq!(outcome, PartOutcome::Skipped("byond".to_string()));
        assert!(!temp_dir.path().join("byond").exists());
    }
}
