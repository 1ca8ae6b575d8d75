// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gamefleet Manager - Game Server Control Plane
//!
//! This crate manages a fleet of containerised game server instances on one
//! host. It restarts instances safely, reports their status, tells deploy
//! pipelines which artifacts are out of date and materializes uploaded
//! artifacts on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Deploy pipelines, operators, dashboards             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │ HTTP
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  gamefleet-manager (This Crate)                     │
//! │                           Port 8564                                 │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌──────────────┐   │
//! │  │  Restart   │  │   Status   │  │ Staleness  │  │    Upload    │   │
//! │  │ Supervisor │  │ Aggregator │  │ Evaluator  │  │   Pipeline   │   │
//! │  └────────────┘  └────────────┘  └────────────┘  └──────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//!           │                │               │                │
//!           ▼                ▼               ▼                ▼
//! ┌──────────────────────────────────┐  ┌─────────────────────────────┐
//! │   docker CLI (ss13-* containers) │  │ SERVERS_ROOT / BYOND_ROOT / │
//! │                                  │  │ RUSTG_ROOT (tar, chown, ...) │
//! └──────────────────────────────────┘  └─────────────────────────────┘
//! ```
//!
//! # HTTP Routes
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /status[?server=NAME]` | Status of one or all managed instances |
//! | `GET\|POST /restart?server=NAME` | Save the world, then restart the container |
//! | `GET /build/check?server&buildstamp&byond&rustg` | Which artifacts are outdated |
//! | `POST /build/upload?server=NAME` | Multipart upload of `build`, `byond`, `rustg` |
//! | `GET /health` | Liveness, version, runner backend and uptime |
//!
//! # Restart State Machine
//!
//! ```text
//!            admitted
//!     ┌──────┐ ────▶ ┌────────────┐
//!     │ IDLE │       │ RESTARTING │
//!     └──────┘ ◀──── └────────────┘
//!           tail finished
//! ```
//!
//! A restart is refused while one is in flight for the same instance or while
//! the container's health is still `starting`.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SERVER_HOST` | `0.0.0.0` | HTTP bind host |
//! | `SERVER_PORT` | `8564` | HTTP bind port |
//! | `SERVERS_ROOT` | `/servers` | Per-instance data root |
//! | `BYOND_ROOT` | `/byond` | Installed BYOND versions |
//! | `RUSTG_ROOT` | `/rust-g` | Installed rust-g versions |
//! | `GAME_USER_OWNER` | `306969` | Owner applied to extracted files |
//! | `GAME_USER_GROUP` | `306969` | Group applied to extracted files |
//! | `GAME_FILE_MODE` | `770` | Octal mode applied to extracted files |
//! | `CONTAINER_PREFIX` | `ss13-` | Managed container name prefix |
//! | `STAGING_DIR` | system temp dir | Where uploads are staged |
//! | `COMMAND_TIMEOUT_SECS` | `120` | Timeout for docker, tar, chown, chmod |
//! | `MAX_UPLOAD_BYTES` | `4294967296` | HTTP request body limit |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`layout`]: Filesystem layout and path validation
//! - [`build_env`]: Build descriptor parsing
//! - [`staleness`]: Artifact staleness evaluation
//! - [`restart`]: Restart supervision
//! - [`status`]: Status aggregation
//! - [`upload`]: Upload materialization
//! - [`runner`]: Container runtime backends
//! - [`filesystem`]: Host filesystem operations
//! - [`handlers`]: Request handlers
//! - [`server`]: HTTP server

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for manager operations.
pub mod error;

/// Filesystem layout of instances and shared components.
pub mod layout;

/// Build descriptor (`.env.build`) parsing.
pub mod build_env;

/// Artifact staleness evaluation.
pub mod staleness;

/// Restart admission and supervision.
pub mod restart;

/// Instance status aggregation.
pub mod status;

/// Artifact upload materialization.
pub mod upload;

/// Bounded external process invocation.
pub mod command;

/// Container runtime backends (docker, mock).
pub mod runner;

/// Host filesystem operations (extraction, ownership).
pub mod filesystem;

/// Request handlers.
pub mod handlers;

/// HTTP server.
pub mod server;

/// Embeddable runtime for gamefleet-manager.
pub mod runtime;

pub use config::Config;
pub use error::Error;
