// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Artifact upload materialization.
//!
//! An uploaded archive is streamed to a staging file, extracted in place over
//! its destination and then handed to the game user:
//!
//! | Target  | Destination                            |
//! |---------|----------------------------------------|
//! | `build` | `{SERVERS_ROOT}/{instance}/game/update` |
//! | `byond` | `{BYOND_ROOT}`                          |
//! | `rustg` | `{RUSTG_ROOT}`                          |
//!
//! Nothing is rolled back when a step fails. Extraction writes directly into
//! the destination, so a concurrent staleness check may observe a partially
//! extracted build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::Ownership;
use crate::error::{Error, Result};
use crate::filesystem::{ArchiveFormat, HostFilesystem};
use crate::layout::{Layout, validate_component};

/// Kind of artifact carried by an upload part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactTarget {
    /// Game build, staged per instance.
    Build,
    /// Shared BYOND runtime.
    Byond,
    /// Shared rust-g library.
    RustG,
}

impl ArtifactTarget {
    /// Upload part name for this target.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactTarget::Build => "build",
            ArtifactTarget::Byond => "byond",
            ArtifactTarget::RustG => "rustg",
        }
    }
}

impl fmt::Display for ArtifactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "build" => Ok(ArtifactTarget::Build),
            "byond" => Ok(ArtifactTarget::Byond),
            "rustg" => Ok(ArtifactTarget::RustG),
            other => Err(Error::InvalidRequest(format!(
                "unknown artifact target: {}",
                other
            ))),
        }
    }
}

/// Streams uploads to disk and materializes them at their destination.
pub struct UploadPipeline {
    layout: Layout,
    ownership: Ownership,
    staging_dir: PathBuf,
    fs: Arc<dyn HostFilesystem>,
}

impl UploadPipeline {
    /// Create a pipeline.
    pub fn new(
        layout: Layout,
        ownership: Ownership,
        staging_dir: impl Into<PathBuf>,
        fs: Arc<dyn HostFilesystem>,
    ) -> Self {
        Self {
            layout,
            ownership,
            staging_dir: staging_dir.into(),
            fs,
        }
    }

    /// `{STAGING_DIR}/{target}-upload-{instance}.{ext}`
    pub fn staging_path(
        &self,
        target: ArtifactTarget,
        instance: &str,
        format: ArchiveFormat,
    ) -> PathBuf {
        self.staging_dir.join(format!(
            "{}-upload-{}.{}",
            target,
            instance,
            format.extension()
        ))
    }

    /// Directory the archive for `target` is extracted into.
    pub fn destination(&self, target: ArtifactTarget, instance: &str) -> PathBuf {
        match target {
            ArtifactTarget::Build => self.layout.update_dir(instance),
            ArtifactTarget::Byond => self.layout.byond_root().to_path_buf(),
            ArtifactTarget::RustG => self.layout.rustg_root().to_path_buf(),
        }
    }

    /// Materialize one uploaded archive and return its destination.
    pub async fn materialize<R>(
        &self,
        target: ArtifactTarget,
        instance: &str,
        format: ArchiveFormat,
        reader: &mut R,
    ) -> Result<PathBuf>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        validate_component("instance name", instance)?;
        if !format.is_supported() {
            return Err(Error::InvalidRequest(format!(
                "unsupported archive format for {}",
                target
            )));
        }

        let staging = self.staging_path(target, instance, format);
        let result = self
            .run(target, instance, format, reader, &staging)
            .await;

        match tokio::fs::remove_file(&staging).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %staging.display(), error = %e, "Failed to remove staging file")
            }
        }

        match &result {
            Ok(dest) => info!(
                instance = %instance,
                target = %target,
                path = %dest.display(),
                "Artifact materialized"
            ),
            Err(e) => warn!(
                instance = %instance,
                target = %target,
                error = %e,
                "Artifact upload failed"
            ),
        }
        result
    }

    async fn run<R>(
        &self,
        target: ArtifactTarget,
        instance: &str,
        format: ArchiveFormat,
        reader: &mut R,
        staging: &Path,
    ) -> Result<PathBuf>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let mut file = tokio::fs::File::create(staging).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await?;
        drop(file);
        debug!(
            path = %staging.display(),
            bytes = written,
            "Upload staged"
        );

        let dest = self.destination(target, instance);
        tokio::fs::create_dir_all(&dest).await?;

        self.fs.extract(staging, &dest, format).await?;
        self.fs.normalize_ownership(&dest, &self.ownership).await?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::ShellFilesystem;
    use tempfile::TempDir;

    fn pipeline(temp_dir: &TempDir) -> UploadPipeline {
        let root = temp_dir.path();
        UploadPipeline::new(
            Layout::new(root.join("servers"), root.join("byond"), root.join("rust-g")),
            Ownership::default(),
            root.join("staging"),
            Arc::new(ShellFilesystem::default()),
        )
    }

    #[test]
    fn test_target_names() {
        for target in [
            ArtifactTarget::Build,
            ArtifactTarget::Byond,
            ArtifactTarget::RustG,
        ] {
            assert_eq!(target.as_str().parse::<ArtifactTarget>().unwrap(), target);
        }
        assert!("config".parse::<ArtifactTarget>().is_err());
    }

    #[test]
    fn test_paths() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);

        assert_eq!(
            pipeline.staging_path(ArtifactTarget::Build, "alpha", ArchiveFormat::Compressed),
            temp_dir.path().join("staging/build-upload-alpha.tar.gz")
        );
        assert_eq!(
            pipeline.destination(ArtifactTarget::Build, "alpha"),
            temp_dir.path().join("servers/alpha/game/update")
        );
        assert_eq!(
            pipeline.destination(ArtifactTarget::RustG, "alpha"),
            temp_dir.path().join("rust-g")
        );
    }

    #[tokio::test]
    async fn test_unsupported_format_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let mut reader: &[u8] = b"whatever";

        let err = pipeline
            .materialize(
                ArtifactTarget::Byond,
                "alpha",
                ArchiveFormat::Unsupported,
                &mut reader,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(!temp_dir.path().join("byond").exists());
    }

    #[tokio::test]
    async fn test_failed_extraction_removes_staging_file() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir);
        let mut reader: &[u8] = b"definitely not gzip";

        let err = pipeline
            .materialize(
                ArtifactTarget::Build,
                "alpha",
                ArchiveFormat::Compressed,
                &mut reader,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Filesystem(_)));

        let staging =
            pipeline.staging_path(ArtifactTarget::Build, "alpha", ArchiveFormat::Compressed);
        assert!(!staging.exists());
        assert!(temp_dir.path().join("servers/alpha/game/update").is_dir());
    }
}
