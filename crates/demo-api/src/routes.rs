// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! This module provides route configuration and handlers for the API server.

pub mod handlers;

use axum::{Router, routing::get};
use handlers::{health_handler, not_found_handler};

use crate::{metrics::metrics_handler, state::ServerState};

/// Create application routes
pub fn create_routes() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
}
