// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for gamefleet-manager.

use thiserror::Error;

/// Manager errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container runtime call failed.
    #[error("Runner error: {0}")]
    Runner(#[from] crate::runner::RunnerError),

    /// Extraction or ownership normalization failed.
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] crate::filesystem::FilesystemError),

    /// Instance is not managed by the container runtime.
    #[error("Server not found: {0}")]
    InstanceNotFound(String),

    /// A restart for this instance is still in flight.
    #[error("Already restarting: {0}")]
    AlreadyRestarting(String),

    /// The container is still starting up and must not be restarted.
    #[error("Currently starting: {0}")]
    CurrentlyStarting(String),

    /// Request validation failed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown instance.
    NotFound,
    /// Restart already in progress, or instance still starting.
    Conflict,
    /// Malformed input.
    InvalidRequest,
    /// Filesystem, process or runtime failure.
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InstanceNotFound(_) => ErrorKind::NotFound,
            Error::AlreadyRestarting(_) | Error::CurrentlyStarting(_) => ErrorKind::Conflict,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Config(_) | Error::Io(_) | Error::Runner(_) | Error::Filesystem(_) => {
                ErrorKind::Io
            }
        }
    }
}

/// Result type using manager Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::InstanceNotFound("alpha".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::AlreadyRestarting("alpha".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::CurrentlyStarting("alpha".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::Io(std::io::Error::other("disk full")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_messages() {
        let err = Error::AlreadyRestarting("alpha".into());
        assert_eq!(err.to_string(), "Already restarting: alpha");
        let err = Error::InstanceNotFound("beta".into());
        assert!(err.to_string().contains("not found"));
    }
}
