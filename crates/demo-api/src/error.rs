// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! This module provides the error types for the server lifecycle: configuration,
//! binding, serving, and the bounded graceful shutdown.

use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

/// Error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The server stopped serving before any shutdown was requested
    #[error("Server stopped serving: {source}")]
    Serve {
        /// Error returned by the serving task
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// In-flight requests did not drain before the grace period elapsed
    #[error("Server shutdown did not complete within {}ms", .grace_period.as_millis())]
    ShutdownTimeout {
        /// Grace period that was exceeded
        grace_period: Duration,
    },

    /// Signal handling errors
    #[error("Signal handling error: {message}")]
    Signal {
        /// Error message
        message: String,
    },

    /// Logging subscriber installation errors
    #[error("Telemetry error: {message}")]
    Telemetry {
        /// Error message
        message: String,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// Whether this error was caused by the shutdown deadline elapsing
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ShutdownTimeout { .. })
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_timeout_message() {
        let err = ServerError::ShutdownTimeout {
            grace_period: Duration::from_millis(100),
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Server shutdown did not complete within 100ms"
        );
    }

    #[test]
    fn serve_error_keeps_source() {
        let err = ServerError::Serve {
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address already in use"),
        };
        assert!(!err.is_timeout());
        let source = std::error::Error::source(&err).expect("serve error has a source");
        assert_eq!(source.to_string(), "address already in use");
    }
}
