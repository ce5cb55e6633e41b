// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Test fixtures for booting the server on an ephemeral port

#![allow(dead_code)]

use std::time::Duration;

use axum::{Router, routing::get};
use demo_api::{RunningServer, Server, ServerConfig, ServerState, ShutdownConfig};

/// Path of the route added by [`slow_routes`]
pub const SLOW_PATH: &str = "/slow";

/// Routes with a single handler that sleeps for `delay` before answering
pub fn slow_routes(delay: Duration) -> Router<ServerState> {
    Router::new().route(
        SLOW_PATH,
        get(move || async move {
            tokio::time::sleep(delay).await;
            "done"
        }),
    )
}

/// Start a server with the given configuration and extra routes
pub async fn start_server(
    config: ServerConfig,
    shutdown_config: ShutdownConfig,
    routes: Router<ServerState>,
) -> RunningServer {
    Server::with_routes(config, shutdown_config, routes)
        .expect("Failed to create server")
        .run_for_testing()
        .await
        .expect("Failed to start test server")
}

/// Start a server with the testing configuration and default routes
pub async fn start_default_server() -> RunningServer {
    start_server(
        ServerConfig::for_testing(),
        ShutdownConfig::default(),
        Router::new(),
    )
    .await
}
