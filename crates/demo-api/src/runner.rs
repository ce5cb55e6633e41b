// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Graceful server runner
//!
//! Serves a pre-bound listener on its own task and waits for whichever comes
//! first: the serving task failing, or a shutdown signal. On a signal the
//! server is asked to drain, bounded by the configured grace period.
//!
//! ```text
//! Running --signal--> Draining --drained / deadline--> Stopped
//! Running --serve error------------------------------> Stopped(error)
//! ```
//!
//! Additional signals received while draining are ignored: the signal source
//! is dropped as soon as the first one has been taken.

use std::{fmt, future::Future, io, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{Instrument, Span, error, info};

use crate::{
    error::{ServerError, ServerResult},
    signal::SignalSource,
};

/// A server that can serve a listener and drain on request
pub trait HttpServer: Send + Sync + 'static {
    /// Bound, accept-ready listener type
    type Listener: Send + 'static;

    /// Serve connections until the listener is closed or fails
    fn serve(&self, listener: Self::Listener) -> impl Future<Output = io::Result<()>> + Send;

    /// Stop accepting and wait for in-flight requests to finish.
    ///
    /// The runner stops waiting at `deadline` regardless of what this returns.
    fn shutdown(&self, deadline: Instant) -> impl Future<Output = io::Result<()>> + Send;

    /// Drop every connection still open, without waiting for responses.
    ///
    /// Called once the grace period has elapsed.
    fn close(&self);
}

/// Runs an [`HttpServer`] until it fails or a signal asks it to stop
pub struct GracefulRunner<S: HttpServer, G> {
    server: Arc<S>,
    listener: S::Listener,
    signals: G,
    grace_period: Duration,
    span: Span,
}

impl<S: HttpServer, G> fmt::Debug for GracefulRunner<S, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GracefulRunner")
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl<S, G> GracefulRunner<S, G>
where
    S: HttpServer,
    G: SignalSource,
{
    /// Create a runner; events are logged under the current span
    pub fn new(server: Arc<S>, listener: S::Listener, signals: G, grace_period: Duration) -> Self {
        Self {
            server,
            listener,
            signals,
            grace_period,
            span: Span::current(),
        }
    }

    /// Log under `span` instead of the span current at construction
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Maximum time allowed for draining
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Serve until a serve error or a shutdown signal, then drain.
    ///
    /// # Errors
    ///
    /// - `ServerError::Serve` if serving failed before any signal arrived.
    /// - `ServerError::TaskJoin` if the serving task panicked before any signal.
    /// - `ServerError::Shutdown` if the server reported a shutdown failure.
    /// - `ServerError::ShutdownTimeout` if draining outlived the grace period.
    pub async fn run(self) -> ServerResult<()> {
        let Self {
            server,
            listener,
            mut signals,
            grace_period,
            span,
        } = self;

        // A single slot is enough: the serving task reports at most once.
        let (errors_tx, mut errors) = mpsc::channel::<io::Error>(1);
        let serving = Arc::clone(&server);
        let mut serve_task = tokio::spawn(
            async move {
                if let Err(source) = serving.serve(listener).await {
                    let _ = errors_tx.try_send(source);
                }
            }
            .instrument(span.clone()),
        );

        let signal = tokio::select! {
            Some(source) = errors.recv() => {
                error!(parent: &span, error = %source, "server stopped serving");
                return Err(ServerError::Serve { source });
            }
            Err(source) = &mut serve_task => {
                error!(parent: &span, error = %source, "serving task aborted");
                return Err(ServerError::TaskJoin { source });
            }
            Some(signal) = signals.recv() => signal,
            else => {
                info!(parent: &span, "server stopped and signal source closed");
                return Ok(());
            }
        };
        drop(signals);

        info!(
            parent: &span,
            signal = %signal,
            grace_period = ?grace_period,
            "server shutdown request received"
        );

        let deadline = Instant::now() + grace_period;
        match time::timeout_at(deadline, server.shutdown(deadline)).await {
            Ok(Ok(())) => {
                info!(parent: &span, "server shut down gracefully");
                Ok(())
            }
            Ok(Err(source)) => {
                error!(parent: &span, error = %source, "server shutdown failed");
                Err(ServerError::Shutdown { source })
            }
            Err(_) => {
                server.close();
                serve_task.abort();
                error!(
                    parent: &span,
                    grace_period = ?grace_period,
                    "grace period elapsed, dropping remaining connections"
                );
                Err(ServerError::ShutdownTimeout { grace_period })
            }
        }
    }
}
