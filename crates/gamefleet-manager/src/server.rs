// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server.
//!
//! Routes requests to [`crate::handlers`] and maps errors to status codes:
//!
//! | Error kind        | Status |
//! |-------------------|--------|
//! | `NotFound`        | 404    |
//! | `Conflict`        | 409    |
//! | `InvalidRequest`  | 400    |
//! | `Io`              | 500    |
//!
//! Every error body is `{"message": "..."}`. Requests missing a required
//! query parameter, or using a method a route does not serve, are answered
//! like unknown routes.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::{Error, ErrorKind};
use crate::handlers::{
    self, BuildCheckRequest, BuildCheckResponse, HealthCheckResponse, ManagerState, PartOutcome,
};
use crate::staleness::ProposedArtifacts;
use crate::status::InstanceStatus;

type Params = Query<HashMap<String, String>>;

/// Build the manager's router.
pub fn router(state: Arc<ManagerState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health).fallback(not_found))
        .route("/status", get(status).fallback(not_found))
        .route("/restart", get(restart).post(restart).fallback(not_found))
        .route("/build/check", get(build_check).fallback(not_found))
        .route("/build/upload", post(build_upload).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    materialized: Vec<String>,
    skipped: Vec<String>,
}

/// Error response with a JSON `{message}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match err {
            Error::InvalidRequest(message) => message,
            other => other.to_string(),
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(MessageResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(ApiError::not_found)
}

// ============================================================================
// Routes
// ============================================================================

async fn not_found() -> ApiError {
    ApiError::not_found()
}

async fn health(State(state): State<Arc<ManagerState>>) -> Json<HealthCheckResponse> {
    Json(handlers::handle_health_check(&state))
}

async fn status(
    State(state): State<Arc<ManagerState>>,
    Query(params): Params,
) -> Result<Json<BTreeMap<String, InstanceStatus>>, ApiError> {
    let instance = params.get("server").map(String::as_str);
    let statuses = handlers::handle_status(&state, instance).await?;
    Ok(Json(statuses))
}

async fn restart(
    State(state): State<Arc<ManagerState>>,
    Query(params): Params,
) -> Result<Json<MessageResponse>, ApiError> {
    let instance = required(&params, "server")?;
    // The handle is dropped: the restart runs on in the background.
    let _ = handlers::handle_restart(&state, instance).await?;
    Ok(Json(MessageResponse {
        message: "Success".to_string(),
    }))
}

async fn build_check(
    State(state): State<Arc<ManagerState>>,
    Query(params): Params,
) -> Result<Json<BuildCheckResponse>, ApiError> {
    let instance = required(&params, "server")?;
    let raw_stamp = required(&params, "buildstamp")?;
    let byond = required(&params, "byond")?;
    let rustg = required(&params, "rustg")?;

    let build_stamp = raw_stamp.trim().parse::<u64>().map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid buildstamp: {raw_stamp}"),
        )
    })?;

    let request = BuildCheckRequest {
        instance: instance.to_string(),
        proposed: ProposedArtifacts {
            build_stamp,
            byond: byond.to_string(),
            rustg: rustg.to_string(),
        },
    };
    let response = handlers::handle_build_check(&state, &request).await?;
    Ok(Json(response))
}

async fn build_upload(
    State(state): State<Arc<ManagerState>>,
    Query(params): Params,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let instance = required(&params, "server")?;
    handlers::handle_upload_start(&state, instance).await?;

    let mut materialized = Vec::new();
    let mut skipped = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        debug!(instance = %instance, part = %name, content_type = ?content_type, "Upload part received");

        let reader = StreamReader::new(field.map_err(io::Error::other));
        tokio::pin!(reader);

        match handlers::handle_upload_part(
            &state,
            instance,
            &name,
            content_type.as_deref(),
            &mut reader,
        )
        .await?
        {
            PartOutcome::Materialized(target) => materialized.push(target.to_string()),
            PartOutcome::Skipped(name) => skipped.push(name),
        }
    }

    Ok(Json(UploadResponse {
        message: "Success".to_string(),
        materialized,
        skipped,
    }))
}
