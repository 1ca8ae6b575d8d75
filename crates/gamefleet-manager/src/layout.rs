// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem layout shared by every instance.
//!
//! ```text
//! {SERVERS_ROOT}/{instance}/game/.env.build          active build descriptor
//! {SERVERS_ROOT}/{instance}/game/update/             staged game build
//! {SERVERS_ROOT}/{instance}/game/update/.env.build   staged build descriptor
//! {BYOND_ROOT}/{version}/                            installed BYOND versions
//! {RUSTG_ROOT}/{version}/                            installed rust-g versions
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the key/value build descriptor inside a game directory.
pub const BUILD_ENV_FILE: &str = ".env.build";

/// Subdirectory of the game directory where new builds are staged.
pub const UPDATE_DIR: &str = "update";

/// Which build descriptor of an instance to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildLocation {
    /// The build the instance is currently running.
    Active,
    /// A build that was uploaded but not yet promoted.
    Staged,
}

/// Filesystem roots for instances and shared runtime components.
#[derive(Debug, Clone)]
pub struct Layout {
    servers_root: PathBuf,
    byond_root: PathBuf,
    rustg_root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new("/servers", "/byond", "/rust-g")
    }
}

impl Layout {
    /// Create a layout from the three roots.
    pub fn new(
        servers_root: impl Into<PathBuf>,
        byond_root: impl Into<PathBuf>,
        rustg_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            servers_root: servers_root.into(),
            byond_root: byond_root.into(),
            rustg_root: rustg_root.into(),
        }
    }

    /// Root holding one directory per instance.
    pub fn servers_root(&self) -> &Path {
        &self.servers_root
    }

    /// Root holding one directory per installed BYOND version.
    pub fn byond_root(&self) -> &Path {
        &self.byond_root
    }

    /// Root holding one directory per installed rust-g version.
    pub fn rustg_root(&self) -> &Path {
        &self.rustg_root
    }

    /// `{SERVERS_ROOT}/{instance}/game`
    pub fn game_dir(&self, instance: &str) -> PathBuf {
        self.servers_root.join(instance).join("game")
    }

    /// `{SERVERS_ROOT}/{instance}/game/update`
    pub fn update_dir(&self, instance: &str) -> PathBuf {
        self.game_dir(instance).join(UPDATE_DIR)
    }

    /// Path of the build descriptor at `location`.
    pub fn build_env_path(&self, instance: &str, location: BuildLocation) -> PathBuf {
        let dir = match location {
            BuildLocation::Active => self.game_dir(instance),
            BuildLocation::Staged => self.update_dir(instance),
        };
        dir.join(BUILD_ENV_FILE)
    }
}

/// Check that `value` can be used as a single path component.
///
/// Instance names and version strings end up in filesystem paths and
/// container names, so anything that could escape its root is refused.
pub fn validate_component(what: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid {}: {:?}", what, value)))
    }
}

/// Whether the instance has a game directory.
pub async fn instance_exists(layout: &Layout, instance: &str) -> bool {
    validate_component("instance name", instance).is_ok()
        && tokio::fs::try_exists(layout.game_dir(instance))
            .await
            .unwrap_or(false)
}
