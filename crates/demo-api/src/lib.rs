// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Demo API Server Implementation
//!
//! This crate provides the HTTP server for the demo API service, built with Axum,
//! with layered configuration, structured request logging and a graceful shutdown
//! runner that bounds how long in-flight requests may take once a signal arrives.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types for startup, serving and shutdown
//! - [`runner`]: The [`GracefulRunner`] state machine and the [`HttpServer`] seam
//! - [`signal`]: Shutdown signal sources (process signals, channels, tokens)
//! - [`server`]: Axum server, router construction and lifecycle entry points
//! - [`routes`]: Route configuration and HTTP request handlers
//! - [`middleware`]: Trace id, request logging, version header and CORS
//! - [`extractors`]: Request-scoped values for handlers
//! - [`metrics`]: Prometheus request instrumentation
//! - [`state`]: Shared application state with cancellation token support
//! - [`telemetry`]: Subscriber setup and the service-wide span

pub mod config;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod runner;
pub mod server;
pub mod signal;
pub mod state;
pub mod telemetry;

pub use config::{Environment, LogFormat, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use extractors::TraceId;
pub use runner::{GracefulRunner, HttpServer};
pub use server::{AxumServer, RunningServer, Server, ShutdownConfig};
pub use signal::{ProcessSignals, Signal, SignalSource};
pub use state::ServerState;
