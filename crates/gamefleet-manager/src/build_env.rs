// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Build descriptor (`.env.build`) handling.
//!
//! Every game build ships a small `key=value` file describing it. The only
//! key the manager interprets is `buildstamp`, a monotonically increasing
//! integer. Lines that are not `key=value` are skipped. A missing or
//! unreadable descriptor is not an error for callers of [`build_stamp`]: a
//! never-deployed instance simply has stamp 0.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::layout::{BuildLocation, Layout};

/// Key holding the build stamp. Keys are compared lower-cased.
pub const BUILD_STAMP_KEY: &str = "buildstamp";

/// Errors from reading a build descriptor.
#[derive(Debug, Error)]
pub enum BuildEnvError {
    /// The descriptor could not be read (usually: does not exist yet).
    #[error("failed to read build descriptor: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not of the form `key=value` (reported by [`BuildEnv::parse_strict`]).
    #[error("malformed build descriptor line {line}: {content:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Offending line.
        content: String,
    },
}

/// Parsed build descriptor, entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    entries: Vec<(String, String)>,
}

impl BuildEnv {
    /// Parse descriptor contents.
    ///
    /// Lines without `=` or with an empty key (comments, stray output) are
    /// skipped so they cannot hide the keys around them.
    pub fn parse(contents: &str) -> Self {
        let mut entries = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            match parse_line(idx, raw) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Skipping build descriptor line"),
            }
        }
        Self { entries }
    }

    /// Parse descriptor contents, failing on the first malformed line.
    pub fn parse_strict(contents: &str) -> Result<Self, BuildEnvError> {
        let mut entries = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            if let Some(entry) = parse_line(idx, raw)? {
                entries.push(entry);
            }
        }
        Ok(Self { entries })
    }

    /// Value for `key` (lower-case). The last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// The build stamp, 0 when absent or not an unsigned integer.
    pub fn build_stamp(&self) -> u64 {
        self.get(BUILD_STAMP_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

fn parse_line(idx: usize, raw: &str) -> Result<Option<(String, String)>, BuildEnvError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let malformed = || BuildEnvError::Malformed {
        line: idx + 1,
        content: line.to_string(),
    };
    let (key, value) = line.split_once('=').ok_or_else(malformed)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(malformed());
    }
    Ok(Some((key.to_lowercase(), value.trim().to_string())))
}

/// Read a descriptor from an explicit path.
pub async fn read_build_env_file(path: &Path) -> Result<BuildEnv, BuildEnvError> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(BuildEnv::parse(&contents))
}

/// Read the active or staged descriptor of an instance.
pub async fn read_build_env(
    layout: &Layout,
    instance: &str,
    location: BuildLocation,
) -> Result<BuildEnv, BuildEnvError> {
    read_build_env_file(&layout.build_env_path(instance, location)).await
}

/// Build stamp of the active or staged build, 0 when unknown.
pub async fn build_stamp(layout: &Layout, instance: &str, location: BuildLocation) -> u64 {
    match read_build_env(layout, instance, location).await {
        Ok(env) => env.build_stamp(),
        Err(e) => {
            debug!(
                instance = %instance,
                location = ?location,
                error = %e,
                "No build stamp available, assuming 0"
            );
            0
        }
    }
}
