// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for gamefleet-manager integration tests.
//!
//! Provides TestContext with a temporary filesystem layout, a mock runner and
//! a recording filesystem that stands in for tar/chown/chmod.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use gamefleet_manager::config::{Config, Ownership};
use gamefleet_manager::filesystem::{ArchiveFormat, FilesystemError, HostFilesystem};
use gamefleet_manager::handlers::ManagerState;
use gamefleet_manager::layout::{BUILD_ENV_FILE, Layout};
use gamefleet_manager::runner::MockRunner;

/// An ownership change applied by [`RecordingFilesystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipChange {
    pub path: PathBuf,
    pub owner: String,
    pub group: String,
    pub mode: u32,
}

/// Filesystem fake.
///
/// "Extracting" copies the staged archive bytes verbatim into
/// `{dest}/.env.build`, so a test can upload a descriptor and observe it.
#[derive(Debug, Default)]
pub struct RecordingFilesystem {
    pub extracted: Mutex<Vec<(PathBuf, ArchiveFormat)>>,
    pub ownership: Mutex<Vec<OwnershipChange>>,
    pub fail_extract: bool,
}

#[async_trait]
impl HostFilesystem for RecordingFilesystem {
    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        format: ArchiveFormat,
    ) -> Result<(), FilesystemError> {
        if self.fail_extract {
            return Err(FilesystemError::UnsupportedFormat);
        }
        let bytes = tokio::fs::read(archive).await?;
        tokio::fs::write(dest.join(BUILD_ENV_FILE), bytes).await?;
        self.extracted.lock().push((dest.to_path_buf(), format));
        Ok(())
    }

    async fn normalize_ownership(
        &self,
        path: &Path,
        ownership: &Ownership,
    ) -> Result<(), FilesystemError> {
        self.ownership.lock().push(OwnershipChange {
            path: path.to_path_buf(),
            owner: ownership.owner.clone(),
            group: ownership.group.clone(),
            mode: ownership.mode,
        });
        Ok(())
    }
}

/// Test context with an isolated layout.
pub struct TestContext {
    pub config: Config,
    pub runner: Arc<MockRunner>,
    pub fs: Arc<RecordingFilesystem>,
    pub state: Arc<ManagerState>,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Context with a default mock runner and recording filesystem.
    pub fn new() -> Self {
        Self::with_parts(MockRunner::new(), RecordingFilesystem::default())
    }

    /// Context built around the given runner.
    pub fn with_runner(runner: MockRunner) -> Self {
        Self::with_parts(runner, RecordingFilesystem::default())
    }

    /// Context built around the given runner and filesystem.
    pub fn with_parts(runner: MockRunner, fs: RecordingFilesystem) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();
        let config = Config {
            layout: Layout::new(root.join("servers"), root.join("byond"), root.join("rust-g")),
            ownership: Ownership {
                owner: "1000".to_string(),
                group: "1001".to_string(),
                mode: 0o770,
            },
            staging_dir: root.join("staging"),
            ..Config::default()
        };
        let runner = Arc::new(runner);
        let fs = Arc::new(fs);
        let state = Arc::new(ManagerState::new(&config, runner.clone(), fs.clone()));

        Self {
            config,
            runner,
            fs,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.config.layout
    }

    /// Create `{SERVERS_ROOT}/{instance}/game`.
    pub async fn create_instance(&self, instance: &str) {
        tokio::fs::create_dir_all(self.layout().game_dir(instance))
            .await
            .expect("Failed to create game dir");
    }

    /// Write the active build descriptor.
    pub async fn write_active_stamp(&self, instance: &str, stamp: u64) {
        let dir = self.layout().game_dir(instance);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(BUILD_ENV_FILE), format!("BUILDSTAMP={}\n", stamp))
            .await
            .unwrap();
    }

    /// Write the staged build descriptor.
    pub async fn write_staged_stamp(&self, instance: &str, stamp: u64) {
        let dir = self.layout().update_dir(instance);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(BUILD_ENV_FILE), format!("BUILDSTAMP={}\n", stamp))
            .await
            .unwrap();
    }

    /// Create `{BYOND_ROOT}/{version}`.
    pub async fn install_byond(&self, version: &str) {
        tokio::fs::create_dir_all(self.layout().byond_root().join(version))
            .await
            .unwrap();
    }

    /// Create `{RUSTG_ROOT}/{version}`.
    pub async fn install_rustg(&self, version: &str) {
        tokio::fs::create_dir_all(self.layout().rustg_root().join(version))
            .await
            .unwrap();
    }
}
