// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for gamefleet-manager.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::layout::Layout;

/// Owner, group and mode applied to every materialized artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// User (numeric id or name) handed to `chown`.
    pub owner: String,
    /// Group (numeric id or name) handed to `chown`.
    pub group: String,
    /// Permission bits handed to `chmod`.
    pub mode: u32,
}

impl Ownership {
    /// `owner:group` as understood by `chown`.
    pub fn chown_spec(&self) -> String {
        format!("{}:{}", self.owner, self.group)
    }

    /// Mode rendered as an octal string, e.g. `770`.
    pub fn chmod_spec(&self) -> String {
        format!("{:o}", self.mode)
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self {
            owner: "306969".to_string(),
            group: "306969".to_string(),
            mode: 0o770,
        }
    }
}

/// Manager configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server address
    pub http_addr: SocketAddr,
    /// Filesystem roots for instances and shared components
    pub layout: Layout,
    /// Ownership applied after extraction
    pub ownership: Ownership,
    /// Prefix identifying managed containers (`ss13-alpha` for instance `alpha`)
    pub container_prefix: String,
    /// Where uploads are staged before extraction
    pub staging_dir: PathBuf,
    /// Upper bound for any single external command (docker, tar, chown, chmod)
    pub command_timeout: Duration,
    /// HTTP request body limit for uploads
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8564)),
            layout: Layout::default(),
            ownership: Ownership::default(),
            container_prefix: "ss13-".to_string(),
            staging_dir: std::env::temp_dir(),
            command_timeout: Duration::from_secs(120),
            max_upload_bytes: usize::try_from(4u64 << 30).unwrap_or(usize::MAX),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env_or = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

        let host: IpAddr = env_or("SERVER_HOST", "0.0.0.0")
            .parse()
            .map_err(|_| ConfigError::InvalidHost)?;
        let port: u16 = env_or("SERVER_PORT", "8564")
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let layout = Layout::new(
            env_or("SERVERS_ROOT", "/servers"),
            env_or("BYOND_ROOT", "/byond"),
            env_or("RUSTG_ROOT", "/rust-g"),
        );

        let owner = parse_principal("GAME_USER_OWNER", env_or("GAME_USER_OWNER", "306969"))?;
        let group = parse_principal("GAME_USER_GROUP", env_or("GAME_USER_GROUP", "306969"))?;
        let mode = u32::from_str_radix(env_or("GAME_FILE_MODE", "770").trim(), 8)
            .ok()
            .filter(|m| *m <= 0o7777)
            .ok_or(ConfigError::InvalidMode)?;

        let staging_dir = lookup("STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.staging_dir);

        let command_timeout = Duration::from_secs(parse_number(
            &lookup,
            "COMMAND_TIMEOUT_SECS",
            defaults.command_timeout.as_secs(),
        )?);
        let max_upload_bytes = usize::try_from(parse_number(
            &lookup,
            "MAX_UPLOAD_BYTES",
            defaults.max_upload_bytes as u64,
        )?)
        .map_err(|_| ConfigError::InvalidNumber("MAX_UPLOAD_BYTES"))?;

        Ok(Self {
            http_addr: SocketAddr::new(host, port),
            layout,
            ownership: Ownership { owner, group, mode },
            container_prefix: env_or("CONTAINER_PREFIX", &defaults.container_prefix),
            staging_dir,
            command_timeout,
            max_upload_bytes,
        })
    }
}

fn parse_number<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var)),
        None => Ok(default),
    }
}

// chown receives `owner:group`, so neither half may contain the separator.
fn parse_principal(var: &'static str, value: String) -> Result<String, ConfigError> {
    let value = value.trim().to_string();
    if value.is_empty() || value.contains(':') || value.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidPrincipal(var));
    }
    Ok(value)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The host is not an IP address.
    #[error("Invalid host address")]
    InvalidHost,
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// The file mode is not an octal permission value.
    #[error("Invalid file mode (expected octal, e.g. 770)")]
    InvalidMode,
    /// A numeric variable could not be parsed.
    #[error("Invalid number in environment variable: {0}")]
    InvalidNumber(&'static str),
    /// An owner or group value cannot be passed to chown.
    #[error("Invalid user or group in environment variable: {0}")]
    InvalidPrincipal(&'static str),
}
