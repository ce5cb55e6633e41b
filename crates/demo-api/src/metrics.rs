// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global HTTP metrics using the default Prometheus registry, a
//! middleware that records them per matched route, and an Axum-compatible
//! metrics handler.

use std::{sync::LazyLock, time::Instant};

use axum::{
    extract::{MatchedPath, Request},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder, register_histogram_vec,
    register_int_counter_vec, register_int_gauge,
};
use tracing::error;

/// Route label used for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Total number of HTTP requests, labeled by method, matched route and status
pub static HTTP_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "demo_api_http_requests_total",
        "Total number of HTTP requests, labeled by method, route and status",
        &["method", "route", "status"]
    )
    .expect("Failed to create demo_api_http_requests_total counter vec")
});

/// Histogram for HTTP request durations in seconds
pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "demo_api_http_request_duration_seconds",
        "HTTP request durations in seconds",
        &["method", "route"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create HTTP request duration histogram")
});

/// Requests currently being handled; drops to zero once draining completes
pub static HTTP_REQUESTS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "demo_api_http_requests_in_flight",
        "Number of HTTP requests currently being handled"
    )
    .expect("Failed to create in-flight requests gauge")
});

/// Record a completed request
///
/// # Arguments
/// * `method` - HTTP method
/// * `route` - Matched route pattern, or [`UNMATCHED_ROUTE`]
/// * `status` - Response status
/// * `duration_secs` - Time spent handling the request
pub fn observe_request(method: &str, route: &str, status: StatusCode, duration_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[method, route, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, route])
        .observe(duration_secs);
}

// Decrements on drop so cancelled requests are not counted forever
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        HTTP_REQUESTS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HTTP_REQUESTS_IN_FLIGHT.dec();
    }
}

/// Middleware recording request count, latency and in-flight requests
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string());

    let start = Instant::now();
    let response = {
        let _in_flight = InFlight::enter();
        next.run(req).await
    };

    observe_request(
        &method,
        &route,
        response.status(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Axum handler that exports metrics in Prometheus text format
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_request_increments_counter() {
        let before = HTTP_REQUESTS
            .with_label_values(&["GET", "/observe-test", "200"])
            .get();

        observe_request("GET", "/observe-test", StatusCode::OK, 0.01);

        let after = HTTP_REQUESTS
            .with_label_values(&["GET", "/observe-test", "200"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[tokio::test]
    async fn handler_exports_text_format() {
        observe_request("GET", "/export-test", StatusCode::NOT_FOUND, 0.02);

        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("metrics body");
        let text = String::from_utf8(body.to_vec()).expect("utf-8 metrics");
        assert!(text.contains("demo_api_http_requests_total"));
        assert!(text.contains("route=\"/export-test\""));
    }
}
