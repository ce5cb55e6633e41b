// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup
//!
//! Installs the global `tracing` subscriber and builds the root `service` span
//! whose fields (application, environment, build, run id) appear on every
//! event emitted while serving.

use chrono::Utc;
use tracing::{Span, info_span};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::{
    config::{LogFormat, ServerConfig},
    error::{ServerError, ServerResult},
};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, filtered by `RUST_LOG` (default `info`)
///
/// # Errors
///
/// Returns `ServerError::Telemetry` if a global subscriber is already set.
pub fn init(format: LogFormat) -> ServerResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    result.map_err(|e| ServerError::Telemetry {
        message: format!("failed to install tracing subscriber: {e}"),
    })
}

/// Root span carrying the service-wide log fields
pub fn service_span(config: &ServerConfig) -> Span {
    let build = &config.build;
    info_span!(
        "service",
        app_name = %build.app_name,
        environment = %config.environment,
        team = build.team_name.as_deref().unwrap_or_default(),
        build_git_hash = build.git_hash.as_deref().unwrap_or_default(),
        build_git_tag = %build.git_tag,
        build_date = %build.build_date.map(|date| date.to_rfc3339()).unwrap_or_default(),
        run_id = %Uuid::new_v4(),
        start_time = %Utc::now().to_rfc3339(),
    )
}
