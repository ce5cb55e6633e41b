// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! This module provides shared application state for the API server,
//! including configuration and the cancellation token that marks draining.

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: ServerConfig,
    /// Cancelled once the server starts draining
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `cancellation_token` - Token cancelled when shutdown begins
    pub fn new(config: ServerConfig, cancellation_token: CancellationToken) -> Self {
        Self {
            config,
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Whether the server has stopped accepting new work
    pub fn is_draining(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_state_creation() {
        let state = ServerState::new(ServerConfig::default(), CancellationToken::new());

        assert!(!state.is_draining());
    }

    #[test]
    fn server_state_with_cancellation_token() {
        let token = CancellationToken::new();
        let state = ServerState::new(ServerConfig::default(), token.child_token());

        assert!(!state.is_draining());

        // Test that the tokens are linked
        token.cancel();
        assert!(state.is_draining());
    }
}
