// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host filesystem operations used when materializing artifacts.
//!
//! Archive extraction and ownership changes are delegated to the host's
//! `tar`, `chown` and `chmod`. The manager never parses archives itself.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::command::{CommandError, run_command};
use crate::config::Ownership;

/// Errors from host filesystem operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilesystemError {
    /// Archive extraction failed.
    #[error("extraction into {dest} failed: {source}")]
    Extract {
        /// Destination directory.
        dest: String,
        /// Underlying failure.
        #[source]
        source: CommandError,
    },

    /// Changing owner or mode failed.
    #[error("normalizing ownership of {path} failed: {source}")]
    Ownership {
        /// Directory being normalized.
        path: String,
        /// Underlying failure.
        #[source]
        source: CommandError,
    },

    /// The archive format cannot be extracted.
    #[error("unsupported archive format")]
    UnsupportedFormat,

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for filesystem operations.
pub type Result<T> = std::result::Result<T, FilesystemError>;

/// Archive format, resolved once from an upload's declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Plain tar.
    Uncompressed,
    /// Gzip-compressed tar.
    Compressed,
    /// Anything else; such uploads are skipped.
    Unsupported,
}

impl ArchiveFormat {
    /// Select the format for a declared content type.
    ///
    /// Parameters (`; charset=...`) are ignored and matching is
    /// case-insensitive. The archive bytes are never inspected.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ArchiveFormat::Unsupported;
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/gzip"
            | "application/x-gzip"
            | "application/x-compressed-tar"
            | "application/x-gtar" => ArchiveFormat::Compressed,
            "application/x-tar" | "application/tar" => ArchiveFormat::Uncompressed,
            _ => ArchiveFormat::Unsupported,
        }
    }

    /// Whether archives of this format can be extracted.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ArchiveFormat::Unsupported)
    }

    /// File extension used for staged archives.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Uncompressed => "tar",
            ArchiveFormat::Compressed => "tar.gz",
            ArchiveFormat::Unsupported => "bin",
        }
    }

    fn tar_flags(&self) -> Option<&'static str> {
        match self {
            ArchiveFormat::Uncompressed => Some("-xf"),
            ArchiveFormat::Compressed => Some("-xzf"),
            ArchiveFormat::Unsupported => None,
        }
    }
}

/// Filesystem operations the upload pipeline delegates to the host.
#[async_trait]
pub trait HostFilesystem: Send + Sync {
    /// Extract `archive` into the existing directory `dest`, in place.
    async fn extract(&self, archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<()>;

    /// Recursively apply `ownership` to `path`.
    async fn normalize_ownership(&self, path: &Path, ownership: &Ownership) -> Result<()>;
}

/// [`HostFilesystem`] backed by `tar`, `chown` and `chmod`.
#[derive(Debug, Clone)]
pub struct ShellFilesystem {
    command_timeout: Duration,
}

impl ShellFilesystem {
    /// Create a shell filesystem with the given per-command timeout.
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

impl Default for ShellFilesystem {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl HostFilesystem for ShellFilesystem {
    async fn extract(&self, archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<()> {
        let flags = format.tar_flags().ok_or(FilesystemError::UnsupportedFormat)?;
        run_command(
            "tar",
            [
                OsStr::new(flags),
                archive.as_os_str(),
                OsStr::new("-C"),
                dest.as_os_str(),
            ],
            self.command_timeout,
        )
        .await
        .map_err(|source| FilesystemError::Extract {
            dest: dest.display().to_string(),
            source,
        })?;

        debug!(archive = %archive.display(), dest = %dest.display(), "Extracted archive");
        Ok(())
    }

    async fn normalize_ownership(&self, path: &Path, ownership: &Ownership) -> Result<()> {
        let wrap = |source| FilesystemError::Ownership {
            path: path.display().to_string(),
            source,
        };

        let chown = ownership.chown_spec();
        run_command(
            "chown",
            [OsStr::new("-R"), OsStr::new(&chown), path.as_os_str()],
            self.command_timeout,
        )
        .await
        .map_err(wrap)?;

        let chmod = ownership.chmod_spec();
        run_command(
            "chmod",
            [OsStr::new("-R"), OsStr::new(&chmod), path.as_os_str()],
            self.command_timeout,
        )
        .await
        .map_err(wrap)?;

        debug!(path = %path.display(), owner = %chown, mode = %chmod, "Normalized ownership");
        Ok(())
    }
}
