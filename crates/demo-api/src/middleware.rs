// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Middleware module for HTTP request processing
//!
//! This module provides the cross-cutting concerns wrapped around every route:
//! trace id propagation, per-request logging, the version header and CORS.

use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
        header::{CONTENT_LENGTH, LOCATION, REFERER, USER_AGENT},
    },
    response::Response,
};
use tower_http::{
    cors::{AllowHeaders, CorsLayer},
    request_id::RequestId,
    trace::{MakeSpan, OnResponse},
};
use tracing::{Level, Span, error, info, info_span, warn};

use crate::error::{ServerError, ServerResult};

/// Header carrying the request trace id, in both directions
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Response header carrying the running build version
pub const VERSION_HEADER: HeaderName = HeaderName::from_static("x-version");

const CORS_MAX_AGE: Duration = Duration::from_secs(300);

/// Remove a blank `X-Trace-Id` so a fresh one is generated downstream
pub async fn drop_blank_trace_id(mut req: Request) -> Request {
    let blank = req
        .headers()
        .get(&TRACE_ID_HEADER)
        .is_some_and(|value| value.as_bytes().iter().all(u8::is_ascii_whitespace));
    if blank {
        req.headers_mut().remove(&TRACE_ID_HEADER);
    }
    req
}

/// Log level for a completed request: errors for 5xx, warnings for 4xx
pub fn level_for_status(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

fn header_str<'a, B>(req: &'a Request<B>, name: &HeaderName) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Declared body size of a response; absent for streamed bodies
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// Builds the `http_request` span with the request's identifying fields
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let trace_id = req
            .extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or_else(|| {
                error!("failed to extract trace id from request");
                "unknown"
            });
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or_default();

        info_span!(
            "http_request",
            trace_id,
            method = %req.method(),
            path = req.uri().path(),
            query = req.uri().query().unwrap_or_default(),
            referer = header_str(req, &REFERER),
            user_agent = header_str(req, &USER_AGENT),
            route,
        )
    }
}

/// Emits one `request complete` event per response, leveled by status
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCompletion;

impl<B> OnResponse<B> for LogCompletion {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let headers = response.headers();
        let location = status
            .is_redirection()
            .then(|| headers.get(LOCATION).and_then(|v| v.to_str().ok()))
            .flatten()
            .unwrap_or_default();
        let content_length = content_length(headers);
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let level = level_for_status(status);
        let status = status.as_u16();

        if level == Level::ERROR {
            error!(parent: span, status, latency_ms, content_length, location, "request complete");
        } else if level == Level::WARN {
            warn!(parent: span, status, latency_ms, content_length, location, "request complete");
        } else {
            info!(parent: span, status, latency_ms, content_length, location, "request complete");
        }
    }
}

/// Value for the `X-Version` header
///
/// # Errors
///
/// Returns `ServerError::Config` if the version is not a valid header value.
pub fn version_header_value(version: &str) -> ServerResult<HeaderValue> {
    HeaderValue::from_str(version).map_err(|e| ServerError::Config {
        message: format!("invalid version {version:?} for {VERSION_HEADER} header: {e}"),
    })
}

/// CORS policy: a single credentialed origin, or permissive when none is set
///
/// # Errors
///
/// Returns `ServerError::Config` if the origin is not a valid header value.
pub fn cors_layer(origin: Option<&str>) -> ServerResult<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };

    let origin = HeaderValue::from_str(origin).map_err(|e| ServerError::Config {
        message: format!("invalid CORS origin {origin:?}: {e}"),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([TRACE_ID_HEADER, VERSION_HEADER])
        .max_age(CORS_MAX_AGE))
}
