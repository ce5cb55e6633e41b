// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the main server struct for the demo API, including
//! router and middleware configuration, and drives the [`GracefulRunner`]
//! with either process signals or the server's `CancellationToken`.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, header::X_CONTENT_TYPE_OPTIONS},
    middleware::{from_fn, map_request},
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    metrics::metrics_middleware,
    middleware::{
        LogCompletion, RequestSpan, TRACE_ID_HEADER, VERSION_HEADER, cors_layer,
        drop_blank_trace_id, version_header_value,
    },
    routes::create_routes,
    runner::{GracefulRunner, HttpServer},
    signal::{ProcessSignals, SignalSource},
    state::ServerState,
};

// Server constants
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight requests once shutdown starts
    pub graceful_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

impl From<&ServerConfig> for ShutdownConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            graceful_timeout: config.shutdown_grace_seconds.value(),
        }
    }
}

/// [`HttpServer`] serving an axum [`Router`] over HTTP/1 and HTTP/2
///
/// Every accepted connection runs on a tracked task. `shutdown` cancels
/// `stop`, which closes the listener and lets each connection finish its
/// in-flight requests; `close` cancels `kill`, which drops them outright.
#[derive(Debug)]
pub struct AxumServer {
    router: Router,
    stop: CancellationToken,
    kill: CancellationToken,
    drained: CancellationToken,
    connections: TaskTracker,
}

impl AxumServer {
    /// Serve `router` until `stop` is cancelled
    pub fn new(router: Router, stop: CancellationToken) -> Self {
        Self {
            router,
            stop,
            kill: CancellationToken::new(),
            drained: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    /// Number of connections still being served
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    async fn accept_loop(&self, listener: &TcpListener) -> io::Result<()> {
        loop {
            let (stream, remote) = tokio::select! {
                () = self.stop.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => {
                        debug!(error = %e, "failed to accept connection");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };
            self.spawn_connection(stream, remote);
        }
    }

    fn spawn_connection(&self, stream: TcpStream, remote: SocketAddr) {
        let service = TowerToHyperService::new(self.router.clone());
        let stop = self.stop.clone();
        let kill = self.kill.clone();

        self.connections.spawn(async move {
            let builder = Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            debug!(%remote, error = %e, "connection closed with error");
                        }
                        break;
                    }
                    () = stop.cancelled(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    () = kill.cancelled() => {
                        debug!(%remote, "connection dropped after grace period");
                        break;
                    }
                }
            }
        });
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

impl HttpServer for AxumServer {
    type Listener = TcpListener;

    async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let result = self.accept_loop(&listener).await;
        drop(listener);
        self.connections.close();
        self.drained.cancel();
        result
    }

    async fn shutdown(&self, _deadline: Instant) -> io::Result<()> {
        self.stop.cancel();
        self.drained.cancelled().await;
        self.connections.wait().await;
        Ok(())
    }

    fn close(&self) {
        self.kill.cancel();
    }
}

/// Handle to a server started with [`Server::run_for_testing`]
#[derive(Debug)]
pub struct RunningServer {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Cancelling this token shuts the server down
    pub cancellation_token: CancellationToken,
    /// The runner task
    pub handle: JoinHandle<ServerResult<()>>,
}

impl RunningServer {
    /// Request shutdown and wait for the runner to finish
    ///
    /// # Errors
    ///
    /// Returns whatever the runner returned, or `ServerError::TaskJoin` if the
    /// runner task panicked.
    pub async fn shutdown(self) -> ServerResult<()> {
        self.cancellation_token.cancel();
        self.handle.await?
    }
}

/// Main server struct
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create new server instance
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the configuration cannot be turned
    /// into middleware (invalid version or CORS origin).
    pub fn new(config: ServerConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        Self::with_routes(config, shutdown_config, Router::new())
    }

    /// Create server with additional routes merged into the default ones
    ///
    /// The extra routes get the same middleware stack as the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the configuration is invalid.
    pub fn with_routes(
        config: ServerConfig,
        shutdown_config: ShutdownConfig,
        routes: Router<ServerState>,
    ) -> ServerResult<Self> {
        let cancellation_token = CancellationToken::new();
        let state = ServerState::new(config.clone(), cancellation_token.child_token());
        let router = Self::create_router(state.clone(), routes)?;

        Ok(Self {
            config,
            router,
            state,
            cancellation_token,
            shutdown_config,
        })
    }

    /// Create application router with middleware
    fn create_router(state: ServerState, routes: Router<ServerState>) -> ServerResult<Router> {
        let config = state.config();
        let timeout_duration = config.timeout_seconds.value();
        let version = version_header_value(&config.build.git_tag)?;
        let cors = cors_layer(config.cors_origin.as_deref())?;

        let middleware = ServiceBuilder::new()
            .layer(map_request(drop_blank_trace_id))
            .layer(SetRequestIdLayer::new(TRACE_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(RequestSpan)
                    .on_response(LogCompletion),
            )
            .layer(PropagateRequestIdLayer::new(TRACE_ID_HEADER))
            .layer(SetResponseHeaderLayer::overriding(VERSION_HEADER, version))
            .layer(SetResponseHeaderLayer::if_not_present(
                X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(cors)
            .layer(TimeoutLayer::new(timeout_duration))
            .layer(from_fn(metrics_middleware));

        Ok(create_routes()
            .merge(routes)
            .layer(middleware)
            .with_state(state))
    }

    async fn bind(&self) -> ServerResult<(TcpListener, SocketAddr)> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %actual_addr,
            environment = %self.config.environment,
            "demo API server starting",
        );

        Ok((listener, actual_addr))
    }

    fn into_runner<G: SignalSource>(
        self,
        listener: TcpListener,
        signals: G,
    ) -> GracefulRunner<AxumServer, G> {
        let server = AxumServer::new(self.router, self.cancellation_token);
        GracefulRunner::new(
            Arc::new(server),
            listener,
            signals,
            self.shutdown_config.graceful_timeout,
        )
    }

    /// Run the server until SIGINT, SIGTERM or [`Server::shutdown`]
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Signal` if the signal handlers cannot be
    /// installed, otherwise the same errors as [`Server::run_with_signals`].
    pub async fn run(self) -> ServerResult<()> {
        let signals = ProcessSignals::new(self.cancellation_token.clone())?;
        self.run_with_signals(signals).await
    }

    /// Run the server until `signals` yields a shutdown signal
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// `ServerError::Serve` if serving fails, and `ServerError::Shutdown` or
    /// `ServerError::ShutdownTimeout` if draining does not complete cleanly.
    pub async fn run_with_signals<G: SignalSource>(self, signals: G) -> ServerResult<()> {
        let (listener, _) = self.bind().await?;
        self.into_runner(listener, signals).run().await
    }

    /// Run server for testing, returns the bound address and runner handle
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address.
    pub async fn run_for_testing(self) -> ServerResult<RunningServer> {
        let (listener, addr) = self.bind().await?;
        let cancellation_token = self.cancellation_token.clone();
        let runner = self.into_runner(listener, cancellation_token.clone());
        let handle = tokio::spawn(runner.run());

        Ok(RunningServer {
            addr,
            cancellation_token,
            handle,
        })
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;

    use super::*;
    use crate::config::{Environment, ServerPort, TimeoutSeconds};

    #[tokio::test]
    async fn server_creation() -> ServerResult<()> {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, ShutdownConfig::default())?;
        assert_eq!(server.config().environment, Environment::Testing);
        assert!(!server.cancellation_token().is_cancelled());
        assert!(!server.state().is_draining());
        Ok(())
    }

    #[tokio::test]
    async fn programmatic_shutdown() -> ServerResult<()> {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, ShutdownConfig::default())?;

        assert!(!server.cancellation_token().is_cancelled());

        server.shutdown();

        assert!(server.cancellation_token().is_cancelled());
        assert!(server.state().is_draining());
        Ok(())
    }

    #[test]
    fn shutdown_config_default() {
        let config = ShutdownConfig::default();
        assert_eq!(
            config.graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }

    #[test]
    fn shutdown_config_from_server_config() {
        let mut config = ServerConfig::for_testing();
        config.shutdown_grace_seconds = TimeoutSeconds::new(12).expect("valid timeout");

        let shutdown = ShutdownConfig::from(&config);
        assert_eq!(shutdown.graceful_timeout, Duration::from_secs(12));
    }

    #[test]
    fn invalid_cors_origin_is_rejected() {
        let mut config = ServerConfig::for_testing();
        config.cors_origin = Some("bad\norigin".to_string());

        let result = Server::new(config, ShutdownConfig::default());
        assert!(matches!(result, Err(ServerError::Config { .. })));
    }

    #[tokio::test]
    async fn occupied_port_fails_to_bind() -> ServerResult<()> {
        let occupied = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let port = occupied.local_addr().expect("local addr").port();

        let mut config = ServerConfig::for_testing();
        config.port = ServerPort::new(port, Environment::Testing).expect("valid port");
        let server = Server::new(config, ShutdownConfig::default())?;

        let result = server.run_with_signals(CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn close_drops_in_flight_connections() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "done"
            }),
        );
        let server = Arc::new(AxumServer::new(router, CancellationToken::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let serving = Arc::clone(&server);
        let serve = tokio::spawn(async move { serving.serve(listener).await });

        let request = tokio::spawn(reqwest::get(format!("http://{addr}/slow")));
        tokio::time::timeout(Duration::from_secs(5), async {
            while server.open_connections() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection accepted");

        let draining =
            tokio::time::timeout(Duration::from_millis(100), server.shutdown(Instant::now())).await;
        assert!(draining.is_err(), "slow request keeps the server draining");

        server.close();
        let response = request.await.expect("request task");
        assert!(response.is_err(), "request should be cut off: {response:?}");

        serve
            .await
            .expect("serve task")
            .expect("serving stops cleanly");
        tokio::time::timeout(Duration::from_secs(1), server.shutdown(Instant::now()))
            .await
            .expect("connections dropped")
            .expect("shutdown completes");
        assert_eq!(server.open_connections(), 0);
    }

    #[tokio::test]
    async fn testing_server_shuts_down_cleanly() -> ServerResult<()> {
        let server = Server::new(ServerConfig::for_testing(), ShutdownConfig::default())?;
        let running = server.run_for_testing().await?;

        assert_ne!(running.addr.port(), 0);
        running.shutdown().await
    }
}
