// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Custom extractors
//!
//! This module provides extractors for request-scoped values set by the
//! middleware stack.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_http::request_id::RequestId;

/// Trace id of the current request, as echoed in the `X-Trace-Id` header
///
/// Empty when the trace id middleware did not run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Read the trace id recorded in the request extensions
    pub fn from_parts(parts: &Parts) -> Self {
        Self(
            parts
                .extensions
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok())
                .unwrap_or_default()
                .to_string(),
        )
    }

    /// Trace id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for TraceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
