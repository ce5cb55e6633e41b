// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Demo API Server
//!
//! Serves the demo API until SIGINT or SIGTERM, then drains in-flight requests.

use anyhow::Result;
use demo_api::{LogFormat, Server, ServerConfig, ShutdownConfig, telemetry};
use tracing::{Instrument, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();

    let format = config
        .as_ref()
        .map_or(LogFormat::default(), |config| config.log_format);
    telemetry::init(format)?;

    let config = config.inspect_err(|e| error!(error = %e, "invalid server configuration"))?;

    let span = telemetry::service_span(&config);
    let shutdown_config = ShutdownConfig::from(&config);
    let server = Server::new(config, shutdown_config)?;

    // NOTE: the `#[tokio::main]` task does not run a worker future, we must spawn
    tokio::spawn(
        async move {
            info!("starting demo API server with graceful shutdown support");
            server.run().await
        }
        .instrument(span),
    )
    .await??;

    Ok(())
}
