//
// Copyright © 2025 Agora
// This file is part of TEN Framework, an open source project.
// Licensed under the Apache License, Version 2.0, with certain conditions.
// Refer to the "LICENSE" file in the root directory for more information.
//
use std::time::Duration;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures while bringing up the telemetry pipelines. All of them are fatal
/// at startup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid telemetry configuration: {0}")]
    Configuration(String),

    #[error("failed to register metric `{name}`: {source}")]
    Registry {
        name: &'static str,
        #[source]
        source: prometheus::Error,
    },

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("push pipeline did not start within {0:?}")]
    StartupTimeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A route failed while handling the request.
    #[error("{0}")]
    Handler(String),

    #[error("Prometheus observability platform not configured")]
    ExpositionUnavailable,

    #[error("failed to encode metrics: {0}")]
    Encoding(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Handler(_) | ApiError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExpositionUnavailable => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "detail": self.to_string()
        }))
    }
}
