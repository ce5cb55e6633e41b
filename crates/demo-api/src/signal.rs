// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shutdown signal sources
//!
//! The runner never registers OS handlers itself. It waits on a [`SignalSource`],
//! which in production is [`ProcessSignals`] and in tests is usually an `mpsc`
//! receiver or a [`CancellationToken`].

use std::{fmt, future::Future};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ServerError, ServerResult};

/// A request to stop the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT or Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Shutdown requested from inside the process
    Programmatic,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Something that delivers shutdown notifications
pub trait SignalSource: Send {
    /// Wait for the next signal.
    ///
    /// Returns `None` once the source is closed and will never deliver again.
    fn recv(&mut self) -> impl Future<Output = Option<Signal>> + Send;
}

impl SignalSource for mpsc::Receiver<Signal> {
    fn recv(&mut self) -> impl Future<Output = Option<Signal>> + Send {
        mpsc::Receiver::recv(self)
    }
}

impl SignalSource for CancellationToken {
    async fn recv(&mut self) -> Option<Signal> {
        self.cancelled().await;
        Some(Signal::Programmatic)
    }
}

/// OS interrupt and terminate signals, plus a token for programmatic shutdown
#[derive(Debug)]
pub struct ProcessSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    token: CancellationToken,
}

impl ProcessSignals {
    /// Register the process signal handlers
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if a handler cannot be registered.
    #[cfg(unix)]
    pub fn new(token: CancellationToken) -> ServerResult<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| ServerError::Signal {
                message: format!("failed to register {name} handler: {e}"),
            })
        };

        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
            token,
        })
    }

    /// Register the process signal handlers
    ///
    /// # Errors
    ///
    /// Never fails on this platform; Ctrl+C registration happens lazily.
    #[cfg(not(unix))]
    pub fn new(token: CancellationToken) -> ServerResult<Self> {
        Ok(Self { token })
    }
}

impl SignalSource for ProcessSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(Signal::Interrupt),
            Some(()) = self.terminate.recv() => Some(Signal::Terminate),
            () = self.token.cancelled() => Some(Signal::Programmatic),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.ok().map(|()| Signal::Interrupt),
            () = self.token.cancelled() => Some(Signal::Programmatic),
        }
    }
}
