// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker runner implementation.
//!
//! Drives the `docker` CLI. Instance `alpha` lives in container
//! `{prefix}alpha`; only running containers carrying the prefix are
//! considered managed.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::run_command;
use crate::config::Config;
use crate::runner::{ContainerRunner, Result};

/// Docker runner configuration
#[derive(Debug, Clone)]
pub struct DockerRunnerConfig {
    /// Path or name of the docker binary
    pub docker_bin: String,
    /// Prefix shared by all managed container names
    pub container_prefix: String,
    /// Name of the game server process signalled before a restart
    pub game_process: String,
    /// Upper bound for a single docker invocation
    pub command_timeout: Duration,
}

impl Default for DockerRunnerConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            container_prefix: "ss13-".to_string(),
            game_process: "DreamDaemon".to_string(),
            command_timeout: Duration::from_secs(120),
        }
    }
}

/// Container runner backed by the docker CLI.
pub struct DockerRunner {
    config: DockerRunnerConfig,
}

impl DockerRunner {
    /// Create a new docker runner
    pub fn new(config: DockerRunnerConfig) -> Self {
        Self { config }
    }

    /// Create a docker runner using the manager configuration's prefix and timeout
    pub fn from_config(config: &Config) -> Self {
        Self::new(DockerRunnerConfig {
            container_prefix: config.container_prefix.clone(),
            command_timeout: config.command_timeout,
            ..DockerRunnerConfig::default()
        })
    }

    /// Container name for an instance
    pub fn container_name(&self, instance: &str) -> String {
        format!("{}{}", self.config.container_prefix, instance)
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        Ok(run_command(&self.config.docker_bin, args, self.config.command_timeout).await?)
    }

    async fn inspect(&self, instance: &str, format: &str) -> Result<String> {
        let container = self.container_name(instance);
        self.docker(&["inspect", "-f", format, container.as_str()]).await
    }
}

/// Extract instance names from `docker container ls` output.
pub fn parse_managed_instances(listing: &str, prefix: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter_map(|name| name.strip_prefix(prefix))
        .filter(|instance| !instance.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ContainerRunner for DockerRunner {
    fn runner_type(&self) -> &'static str {
        "docker"
    }

    async fn list_managed_instances(&self) -> Result<Vec<String>> {
        let listing = self
            .docker(&["container", "ls", "--format", "{{.Names}}"])
            .await?;
        let instances = parse_managed_instances(&listing, &self.config.container_prefix);
        debug!(count = instances.len(), "Listed managed instances");
        Ok(instances)
    }

    async fn state_status(&self, instance: &str) -> Result<String> {
        self.inspect(instance, "{{.State.Status}}").await
    }

    async fn state_health(&self, instance: &str) -> Result<String> {
        // Containers without a health check have no .State.Health at all.
        self.inspect(
            instance,
            "{{if .State.Health}}{{.State.Health.Status}}{{end}}",
        )
        .await
    }

    async fn state_started_at(&self, instance: &str) -> Result<String> {
        self.inspect(instance, "{{.State.StartedAt}}").await
    }

    async fn signal_graceful_save(&self, instance: &str) -> Result<()> {
        let container = self.container_name(instance);
        self.docker(&[
            "exec",
            container.as_str(),
            "pkill",
            "-USR2",
            self.config.game_process.as_str(),
        ])
        .await?;
        debug!(instance = %instance, container = %container, "Sent graceful save signal");
        Ok(())
    }

    async fn restart_instance(&self, instance: &str) -> Result<()> {
        let container = self.container_name(instance);
        self.docker(&["restart", container.as_str()]).await?;
        info!(instance = %instance, container = %container, "Container restarted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_managed_instances() {
        let listing = "ss13-alpha\npostgres\nss13-beta\n\nss13-\n";
        assert_eq!(
            parse_managed_instances(listing, "ss13-"),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_parse_only_strips_leading_prefix() {
        assert_eq!(
            parse_managed_instances("ss13-ss13-test", "ss13-"),
            vec!["ss13-test".to_string()]
        );
        assert!(parse_managed_instances("my-ss13-alpha", "ss13-").is_empty());
    }

    #[test]
    fn test_container_name() {
        let runner = DockerRunner::new(DockerRunnerConfig {
            container_prefix: "game-".to_string(),
            ..Default::default()
        });
        assert_eq!(runner.container_name("alpha"), "game-alpha");
        assert_eq!(runner.runner_type(), "docker");
    }

    #[tokio::test]
    async fn test_missing_docker_binary_is_an_error() {
        let runner = DockerRunner::new(DockerRunnerConfig {
            docker_bin: "/nonexistent/docker".to_string(),
            ..Default::default()
        });
        assert!(runner.list_managed_instances().await.is_err());
        assert!(runner.restart_instance("alpha").await.is_err());
    }
}
