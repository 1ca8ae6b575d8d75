// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Artifact staleness evaluation.
//!
//! Decides which artifacts a deploy pipeline has to upload for an instance:
//!
//! - **game**: the proposed build stamp is newer than the staged build, or,
//!   when nothing is staged, newer than the active build. Comparing against a
//!   staged build keeps an already-uploaded build from being requested again
//!   before the instance has picked it up.
//! - **byond** / **rustg**: shared components are installed by version
//!   string, so they are stale exactly when `{ROOT}/{version}` is missing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build_env::build_stamp;
use crate::error::Result;
use crate::layout::{BuildLocation, Layout, validate_component};

/// Which artifacts need to be uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outdated {
    /// The game build is older than the proposed one.
    pub game: bool,
    /// The proposed BYOND version is not installed.
    pub byond: bool,
    /// The proposed rust-g version is not installed.
    pub rustg: bool,
}

impl Outdated {
    /// Whether anything needs uploading.
    pub fn any(&self) -> bool {
        self.game || self.byond || self.rustg
    }
}

/// Versions offered by a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedArtifacts {
    /// Build stamp of the offered game build.
    pub build_stamp: u64,
    /// Offered BYOND version.
    pub byond: String,
    /// Offered rust-g version.
    pub rustg: String,
}

/// Compares deployed artifacts against proposed ones.
#[derive(Debug, Clone)]
pub struct StalenessEvaluator {
    layout: Layout,
}

impl StalenessEvaluator {
    /// Create an evaluator over the given layout.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Evaluate which artifacts of `instance` are stale.
    ///
    /// The instance must have been checked for existence by the caller.
    pub async fn evaluate(&self, instance: &str, proposed: &ProposedArtifacts) -> Result<Outdated> {
        validate_component("instance name", instance)?;
        validate_component("byond version", &proposed.byond)?;
        validate_component("rustg version", &proposed.rustg)?;

        let game = self.game_outdated(instance, proposed.build_stamp).await;
        let byond = !version_installed(self.layout.byond_root(), &proposed.byond).await;
        let rustg = !version_installed(self.layout.rustg_root(), &proposed.rustg).await;

        let outdated = Outdated { game, byond, rustg };
        debug!(
            instance = %instance,
            build_stamp = proposed.build_stamp,
            byond = %proposed.byond,
            rustg = %proposed.rustg,
            outdated = ?outdated,
            "Evaluated artifact staleness"
        );
        Ok(outdated)
    }

    async fn game_outdated(&self, instance: &str, proposed: u64) -> bool {
        let staged = build_stamp(&self.layout, instance, BuildLocation::Staged).await;
        if staged > 0 {
            return proposed > staged;
        }
        let active = build_stamp(&self.layout, instance, BuildLocation::Active).await;
        proposed > active
    }
}

async fn version_installed(root: &Path, version: &str) -> bool {
    tokio::fs::try_exists(root.join(version))
        .await
        .unwrap_or(false)
}
