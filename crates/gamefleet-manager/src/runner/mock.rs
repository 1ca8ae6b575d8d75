// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runner for testing.
//!
//! Simulates a container runtime in memory without talking to docker.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use super::traits::*;

/// Mock container state.
#[derive(Debug, Clone)]
struct MockInstance {
    status: String,
    health: String,
    started_at: String,
    restarts: u32,
}

/// A call observed by the mock runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `list_managed_instances`
    List,
    /// `state_status`
    Status(String),
    /// `state_health`
    Health(String),
    /// `state_started_at`
    StartedAt(String),
    /// `signal_graceful_save`
    Signal(String),
    /// `restart_instance`
    Restart(String),
}

/// Mock runner for testing.
pub struct MockRunner {
    instances: Arc<Mutex<BTreeMap<String, MockInstance>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    restart_gate: Option<Arc<Semaphore>>,
    /// Optional delay to simulate a slow restart (in milliseconds)
    pub restart_delay_ms: u64,
    /// If true, the graceful save signal fails
    pub fail_signal: bool,
    /// If true, the container restart fails
    pub fail_restart: bool,
    /// If true, listing managed instances fails
    pub fail_listing: bool,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner with no instances.
    pub fn new() -> Self {
        Self {
            instances: Arc::new(Mutex::new(BTreeMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            restart_gate: None,
            restart_delay_ms: 0,
            fail_signal: false,
            fail_restart: false,
            fail_listing: false,
        }
    }

    /// Create a mock runner whose restarts block until [`release_restart`](Self::release_restart)
    /// is called, one release per restart.
    pub fn gated() -> Self {
        Self {
            restart_gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    /// Let one pending (or future) restart complete.
    pub fn release_restart(&self) {
        if let Some(gate) = &self.restart_gate {
            gate.add_permits(1);
        }
    }

    /// Add a running, healthy instance.
    pub async fn add_instance(&self, name: &str) {
        self.add_instance_with_health(name, "healthy").await;
    }

    /// Add a running instance with the given health.
    pub async fn add_instance_with_health(&self, name: &str, health: &str) {
        let mut instances = self.instances.lock().await;
        instances.insert(
            name.to_string(),
            MockInstance {
                status: "running".to_string(),
                health: health.to_string(),
                started_at: "2025-01-01T00:00:00.000000000Z".to_string(),
                restarts: 0,
            },
        );
    }

    /// Change the reported health of an instance.
    pub async fn set_health(&self, name: &str, health: &str) {
        let mut instances = self.instances.lock().await;
        if let Some(instance) = instances.get_mut(name) {
            instance.health = health.to_string();
        }
    }

    /// Number of completed restarts for an instance.
    pub async fn restart_count(&self, name: &str) -> u32 {
        let instances = self.instances.lock().await;
        instances.get(name).map(|i| i.restarts).unwrap_or(0)
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: MockCall) {
        self.calls.lock().await.push(call);
    }

    async fn with_instance<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MockInstance) -> T,
    ) -> Result<T> {
        let mut instances = self.instances.lock().await;
        instances
            .get_mut(name)
            .map(f)
            .ok_or_else(|| RunnerError::Other(format!("No such container: {}", name)))
    }
}

#[async_trait]
impl ContainerRunner for MockRunner {
    fn runner_type(&self) -> &'static str {
        "mock"
    }

    async fn list_managed_instances(&self) -> Result<Vec<String>> {
        self.record(MockCall::List).await;
        if self.fail_listing {
            return Err(RunnerError::Other("Mock listing failure".to_string()));
        }
        let instances = self.instances.lock().await;
        Ok(instances.keys().cloned().collect())
    }

    async fn state_status(&self, instance: &str) -> Result<String> {
        self.record(MockCall::Status(instance.to_string())).await;
        self.with_instance(instance, |i| i.status.clone()).await
    }

    async fn state_health(&self, instance: &str) -> Result<String> {
        self.record(MockCall::Health(instance.to_string())).await;
        self.with_instance(instance, |i| i.health.clone()).await
    }

    async fn state_started_at(&self, instance: &str) -> Result<String> {
        self.record(MockCall::StartedAt(instance.to_string())).await;
        self.with_instance(instance, |i| i.started_at.clone()).await
    }

    async fn signal_graceful_save(&self, instance: &str) -> Result<()> {
        self.record(MockCall::Signal(instance.to_string())).await;
        if self.fail_signal {
            return Err(RunnerError::Other("Mock signal failure".to_string()));
        }
        self.with_instance(instance, |_| ()).await
    }

    async fn restart_instance(&self, instance: &str) -> Result<()> {
        self.record(MockCall::Restart(instance.to_string())).await;

        if self.restart_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.restart_delay_ms)).await;
        }

        if let Some(gate) = &self.restart_gate {
            gate.acquire()
                .await
                .map_err(|e| RunnerError::Other(e.to_string()))?
                .forget();
        }

        if self.fail_restart {
            return Err(RunnerError::Other("Mock restart failure".to_string()));
        }

        self.with_instance(instance, |i| {
            i.restarts += 1;
            i.status = "running".to_string();
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_lists_instances() {
        let runner = MockRunner::new();
        runner.add_instance("beta").await;
        runner.add_instance("alpha").await;

        let listed = runner.list_managed_instances().await.unwrap();
        assert_eq!(listed, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_runner_unknown_instance() {
        let runner = MockRunner::new();
        assert!(runner.state_status("ghost").await.is_err());
        assert!(runner.restart_instance("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_runner_restart_counts() {
        let runner = MockRunner::new();
        runner.add_instance("alpha").await;

        runner.signal_graceful_save("alpha").await.unwrap();
        runner.restart_instance("alpha").await.unwrap();

        assert_eq!(runner.restart_count("alpha").await, 1);
        assert_eq!(
            runner.calls().await,
            vec![
                MockCall::Signal("alpha".to_string()),
                MockCall::Restart("alpha".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_runner_gated_restart() {
        let runner = Arc::new(MockRunner::gated());
        runner.add_instance("alpha").await;

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.restart_instance("alpha").await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        runner.release_restart();
        task.await.unwrap().unwrap();
        assert_eq!(runner.restart_count("alpha").await, 1);
    }

    #[tokio::test]
    async fn test_mock_runner_failures() {
        let runner = MockRunner {
            fail_signal: true,
            fail_listing: true,
            ..MockRunner::new()
        };
        runner.add_instance("alpha").await;

        assert!(runner.signal_graceful_save("alpha").await.is_err());
        assert!(runner.list_managed_instances().await.is_err());
    }
}
