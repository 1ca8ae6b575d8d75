// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner module - container runtime backends.

pub mod docker;
pub mod mock;
mod traits;

pub use docker::{DockerRunner, DockerRunnerConfig};
pub use mock::{MockCall, MockRunner};
pub use traits::*;
