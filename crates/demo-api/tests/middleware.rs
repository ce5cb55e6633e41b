// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the middleware stack and built-in routes

mod fixtures;

use axum::{Router, http::StatusCode};
use demo_api::{ServerConfig, ShutdownConfig};
use fixtures::{start_default_server, start_server};
use serde_json::Value;

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn trace_id_is_generated() {
    let server = start_default_server().await;

    let response = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let trace_id = header(&response, "x-trace-id")
        .expect("trace id header")
        .to_string();
    assert_eq!(trace_id.len(), 36);

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["trace_id"], trace_id.as_str());
    assert_eq!(body["message"], "OK");

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn trace_id_is_preserved() {
    let server = start_default_server().await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/health", server.addr))
        .header("X-Trace-Id", "my-cool-trace-id")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(header(&response, "x-trace-id"), Some("my-cool-trace-id"));
    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["trace_id"], "my-cool-trace-id");

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn blank_trace_id_is_replaced() {
    let server = start_default_server().await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/health", server.addr))
        .header("X-Trace-Id", " ")
        .send()
        .await
        .expect("Failed to send request");

    let trace_id = header(&response, "x-trace-id").expect("trace id header");
    assert_eq!(trace_id.len(), 36);

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn version_and_nosniff_headers_are_set() {
    let server = start_default_server().await;

    let response = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .expect("Failed to send request");

    assert_eq!(
        header(&response, "x-version"),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn unknown_route_returns_json_not_found() {
    let server = start_default_server().await;

    let response = reqwest::get(format!("http://{}/nope", server.addr))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, "x-version").is_some());
    let trace_id = header(&response, "x-trace-id")
        .expect("trace id header")
        .to_string();

    let body: Value = response.json().await.expect("json body");
    assert_eq!(body["message"], "not found");
    assert_eq!(body["trace_id"], trace_id.as_str());

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let mut config = ServerConfig::for_testing();
    config.cors_origin = Some("https://app.example.com".to_string());
    let server = start_server(config, ShutdownConfig::default(), Router::new()).await;

    let response = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/health", server.addr),
        )
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "authorization")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://app.example.com")
    );
    assert_eq!(
        header(&response, "access-control-allow-credentials"),
        Some("true")
    );
    assert_eq!(header(&response, "access-control-max-age"), Some("300"));
    assert_eq!(
        header(&response, "access-control-allow-headers"),
        Some("authorization")
    );

    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn metrics_are_exported() {
    let server = start_default_server().await;
    let client = reqwest::Client::new();

    client
        .get(format!("http://{}/health", server.addr))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .get(format!("http://{}/metrics", server.addr))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("text body");
    assert!(body.contains("demo_api_http_requests_total"));
    assert!(body.contains(r#"route="/health""#));
    assert!(body.contains("demo_api_http_requests_in_flight"));

    server.shutdown().await.expect("clean shutdown");
}
