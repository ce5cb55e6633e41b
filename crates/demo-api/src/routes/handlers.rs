// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! Every JSON body carries the request's trace id so a caller can quote it
//! when reporting a problem.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{extractors::TraceId, state::ServerState};

/// A message plus the trace id needed to find the request in the logs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimpleResponse {
    /// Trace id of the request
    pub trace_id: String,
    /// Human-readable message
    pub message: String,
}

impl SimpleResponse {
    /// Create a response for the given trace id
    pub fn new(trace_id: TraceId, message: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.0,
            message: message.into(),
        }
    }
}

/// Health check endpoint handler
///
/// Answers `503 Service Unavailable` once the server has started draining, so
/// load balancers stop routing new traffic here.
pub async fn health_handler(
    State(state): State<ServerState>,
    trace_id: TraceId,
) -> (StatusCode, Json<SimpleResponse>) {
    if state.is_draining() {
        debug!(environment = %state.config().environment, "health check while draining");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleResponse::new(trace_id, "shutting down")),
        );
    }

    (StatusCode::OK, Json(SimpleResponse::new(trace_id, "OK")))
}

/// Fallback for unknown resources
pub async fn not_found_handler(trace_id: TraceId) -> (StatusCode, Json<SimpleResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(SimpleResponse::new(trace_id, "not found")),
    )
}
