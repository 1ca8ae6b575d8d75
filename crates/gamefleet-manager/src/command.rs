// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External process invocation.
//!
//! Every call into docker, tar, chown or chmod goes through [`run_command`],
//! which owns the timeout and turns a non-zero exit into an error carrying
//! the program's stderr.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from running an external program.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish in time and was killed.
    #[error("{program} timed out after {secs}s")]
    Timeout {
        /// Program name.
        program: String,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// The program exited unsuccessfully.
    #[error("{program} exited with code {exit_code}: {stderr}")]
    ExitCode {
        /// Program name.
        program: String,
        /// Exit code, -1 if killed by a signal.
        exit_code: i32,
        /// Trimmed standard error.
        stderr: String,
    },
}

/// Run `program` with `args` and return its trimmed stdout.
pub async fn run_command<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<String, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = ?cmd.as_std(), "Running external command");

    let child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Dropping the future on timeout kills the child (kill_on_drop).
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout.as_secs(), "Command timed out");
            return Err(CommandError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(CommandError::ExitCode {
            program: program.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
